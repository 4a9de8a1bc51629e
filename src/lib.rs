//! Client-side session handling for the construction CRM: credential
//! persistence, expiry, display-name resolution and role-based route guards.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;

pub use api::{HttpIdentityApi, IdentityApi};
pub use auth::{GuardDecision, Role, Session, SessionEvent, SessionService, TokenStore, User};
pub use config::SessionConfig;
pub use error::{ApiError, SessionError};

/// Loads `.env`, sets up logging and builds a [`SessionService`] from the environment.
pub fn bootstrap() -> anyhow::Result<SessionService> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = SessionConfig::from_env()?;
    tracing::info!(
        api = %config.api_base_url,
        persistent = config.storage_path.is_some(),
        "session service configured"
    );
    SessionService::from_config(config)
}
