use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Sessions expire this long after the token was stored locally.
pub const SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// How often the expiration monitor looks at the stored timestamp.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub api_base_url: String,
    pub storage_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    #[serde(skip, default = "default_ttl")]
    pub session_ttl: Duration,
    #[serde(skip, default = "default_check_interval")]
    pub check_interval: Duration,
}

fn default_ttl() -> Duration {
    SESSION_TTL
}

fn default_check_interval() -> Duration {
    CHECK_INTERVAL
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".into(),
            storage_path: None,
            request_timeout_secs: 15,
            session_ttl: SESSION_TTL,
            check_interval: CHECK_INTERVAL,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url = std::env::var("CRM_API_URL")?;
        let storage_path = std::env::var("CRM_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let request_timeout_secs = std::env::var("CRM_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15);
        Ok(Self {
            api_base_url,
            storage_path,
            request_timeout_secs,
            ..Self::default()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_fixed_ttl_and_interval() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.session_ttl, Duration::from_secs(7200));
        assert_eq!(cfg.check_interval, Duration::from_secs(60));
        assert!(cfg.storage_path.is_none());
    }

    #[test]
    fn deserializes_without_timing_fields() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{"api_base_url":"https://crm.example.com/api","storage_path":"/tmp/s.json","request_timeout_secs":5}"#,
        )
        .expect("config should parse");
        assert_eq!(cfg.api_base_url, "https://crm.example.com/api");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.session_ttl, SESSION_TTL);
    }
}
