use thiserror::Error;

/// Failures talking to the remote CRM API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend refused the credentials. Carries the backend's message verbatim.
    #[error("{0}")]
    Unauthorized(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response payload: {0}")]
    Decode(String),
}

/// Errors surfaced by [`crate::SessionService`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad credentials at login; shown to the user as-is.
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
    #[error("failed to persist session: {0:#}")]
    Storage(anyhow::Error),
}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized(message) => SessionError::Authentication(message),
            other => SessionError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_authentication_with_same_message() {
        let err: SessionError = ApiError::Unauthorized("Contraseña incorrecta".into()).into();
        assert!(matches!(err, SessionError::Authentication(_)));
        assert_eq!(err.to_string(), "Contraseña incorrecta");
    }

    #[test]
    fn other_api_errors_map_to_unavailable() {
        let err: SessionError = ApiError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, SessionError::Unavailable(_)));
        assert!(err.to_string().contains("502"));
    }
}
