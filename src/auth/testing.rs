//! Test doubles shared by the auth unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::dto::{Customer, Employee, IdentityRecord, LoginResponse, Role, User};
use crate::api::IdentityApi;
use crate::error::ApiError;

pub fn user_with_role(role: Role, email: &str) -> User {
    User {
        id: "u-17".into(),
        name: String::new(),
        email: email.into(),
        role,
        department: None,
        position: None,
        customer_id: None,
    }
}

/// Answers from canned data; `None` means the endpoint fails.
#[derive(Default)]
pub struct FakeApi {
    pub login: Option<LoginResponse>,
    pub identity: Option<IdentityRecord>,
    pub customers: Option<Vec<Customer>>,
    pub employees: Option<Vec<Employee>>,
    /// Makes `current_identity` fail even when `identity` is set.
    pub identity_down: AtomicBool,
    pub calls: Mutex<Vec<&'static str>>,
    /// Email and password of every login attempt, as received.
    pub logins: Mutex<Vec<(String, String)>>,
}

impl FakeApi {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }
}

#[async_trait]
impl IdentityApi for FakeApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.record("login");
        self.logins
            .lock()
            .unwrap()
            .push((email.to_string(), password.to_string()));
        match &self.login {
            Some(res) if password == "correct" => Ok(res.clone()),
            Some(_) => Err(ApiError::Unauthorized("Contraseña incorrecta".into())),
            None => Err(Self::unavailable()),
        }
    }

    async fn current_identity(&self, _token: &str) -> Result<IdentityRecord, ApiError> {
        self.record("current_identity");
        if self.identity_down.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.identity.clone().ok_or_else(Self::unavailable)
    }

    async fn customers_by_user_id(&self, _user_id: &str) -> Result<Vec<Customer>, ApiError> {
        self.record("customers_by_user_id");
        self.customers.clone().ok_or_else(Self::unavailable)
    }

    async fn employees(&self) -> Result<Vec<Employee>, ApiError> {
        self.record("employees");
        self.employees.clone().ok_or_else(Self::unavailable)
    }
}
