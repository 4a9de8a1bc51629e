use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::auth::dto::{
    Customer, CustomerList, Employee, IdentityRecord, IdentityResponse, LoginRequest,
    LoginResponse,
};
use crate::error::ApiError;

/// The handful of remote calls the session subsystem needs.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn current_identity(&self, token: &str) -> Result<IdentityRecord, ApiError>;
    async fn customers_by_user_id(&self, user_id: &str) -> Result<Vec<Customer>, ApiError>;
    async fn employees(&self) -> Result<Vec<Employee>, ApiError>;
}

#[derive(Clone)]
pub struct HttpIdentityApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpIdentityApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Picks the human message out of an error body such as `{"message": "..."}`.
fn rejection_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error", "msg"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(m) => m,
        None if body.trim().is_empty() => "Invalid credentials".to_string(),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .http
            .post(self.url("auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "login rejected");
            return Err(ApiError::Unauthorized(rejection_message(&body)));
        }
        Self::read_json(response).await
    }

    async fn current_identity(&self, token: &str) -> Result<IdentityRecord, ApiError> {
        let response = self
            .http
            .get(self.url("auth/me"))
            .bearer_auth(token)
            .send()
            .await?;
        let body: IdentityResponse = Self::read_json(response).await?;
        Ok(body.user)
    }

    async fn customers_by_user_id(&self, user_id: &str) -> Result<Vec<Customer>, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("customers/user/{user_id}")))
            .send()
            .await?;
        let body: CustomerList = Self::read_json(response).await?;
        Ok(body.customer)
    }

    async fn employees(&self) -> Result<Vec<Employee>, ApiError> {
        let response = self.http.get(self.url("employees")).send().await?;
        Self::read_json(response).await
    }
}
