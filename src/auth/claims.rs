use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};
use tracing::debug;

/// Payload of a credential token, read WITHOUT signature verification.
///
/// Only useful as a display hint. It deliberately offers no way to obtain a
/// `User` or a `Role`, so it cannot leak into authorization decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiedClaims(Map<String, Value>);

impl UnverifiedClaims {
    /// Reads the middle segment of `header.payload.signature`. Any failure yields `None`.
    pub fn decode(token: &str) -> Option<Self> {
        let mut segments = token.trim().split('.');
        let (_header, payload) = (segments.next()?, segments.next()?);
        if payload.is_empty() {
            debug!("token has an empty payload segment");
            return None;
        }

        let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "token payload is not base64url");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Some(Self(map)),
            Ok(_) => {
                debug!("token payload is not a JSON object");
                None
            }
            Err(e) => {
                debug!(error = %e, "token payload is not JSON");
                None
            }
        }
    }

    /// String claim, trimmed; empty strings count as absent.
    pub fn get_str(&self, claim: &str) -> Option<&str> {
        self.0
            .get(claim)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `name` followed by `lastName` (or `secondName`).
    pub fn display_name(&self) -> Option<String> {
        let first = self.get_str("name")?;
        let last = self
            .get_str("lastName")
            .or_else(|| self.get_str("secondName"));
        Some(super::resolver::join_name(Some(first), last))
    }
}
