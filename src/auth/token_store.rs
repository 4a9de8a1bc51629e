use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::debug;

use super::dto::User;
use super::resolver::NameOrigin;
use crate::storage::{KeyValueStore, MemoryStorage};

pub const TOKEN_KEY: &str = "token";
pub const ISSUED_AT_KEY: &str = "tokenTimestamp";
pub const USER_KEY: &str = "user";
/// Which resolver step produced `user.name`; empty when not known.
pub const NAME_ORIGIN_KEY: &str = "userNameOrigin";

/// Client-side record of who is logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub issued_at: OffsetDateTime,
    pub user: User,
    pub name_origin: Option<NameOrigin>,
}

impl Session {
    pub fn age_at(&self, now: OffsetDateTime) -> Duration {
        let age = now - self.issued_at;
        Duration::try_from(age).unwrap_or(Duration::ZERO)
    }

    pub fn is_valid_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        !self.token.is_empty() && self.age_at(now) < ttl
    }

    pub fn remaining_at(&self, now: OffsetDateTime, ttl: Duration) -> Duration {
        ttl.saturating_sub(self.age_at(now))
    }
}

/// Persists token, issuance time and user as entries of a [`KeyValueStore`],
/// plus the origin of the user's display name once it has been resolved.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn save(&self, token: &str, user: &User) -> anyhow::Result<Session> {
        self.save_at(token, user, OffsetDateTime::now_utc())
    }

    pub fn save_at(
        &self,
        token: &str,
        user: &User,
        issued_at: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        let stamp = to_millis(issued_at).to_string();
        let user_json = serde_json::to_string(user)?;
        self.backend.set_many(&[
            (TOKEN_KEY, token),
            (ISSUED_AT_KEY, stamp.as_str()),
            (USER_KEY, user_json.as_str()),
            (NAME_ORIGIN_KEY, ""),
        ])?;
        debug!(user_id = %user.id, "session saved");
        Ok(Session {
            token: token.to_string(),
            issued_at: from_millis(to_millis(issued_at)).unwrap_or(issued_at),
            user: user.clone(),
            name_origin: None,
        })
    }

    /// Rebuilds the stored session without looking at its age.
    pub fn load(&self) -> Option<Session> {
        let token = self.backend.get(TOKEN_KEY)?;
        let issued_at = self.issued_at()?;
        let raw_user = self.backend.get(USER_KEY)?;
        let user = match serde_json::from_str::<User>(&raw_user) {
            Ok(u) => u,
            Err(e) => {
                debug!(error = %e, "stored user is unreadable");
                return None;
            }
        };
        Some(Session {
            token,
            issued_at,
            user,
            name_origin: self.name_origin(),
        })
    }

    fn name_origin(&self) -> Option<NameOrigin> {
        let raw = self.backend.get(NAME_ORIGIN_KEY)?;
        if raw.is_empty() {
            return None;
        }
        serde_json::from_str(&raw).ok()
    }

    pub fn issued_at(&self) -> Option<OffsetDateTime> {
        let raw = self.backend.get(ISSUED_AT_KEY)?;
        let millis = raw.trim().parse::<i64>().ok()?;
        from_millis(millis)
    }

    pub fn update_user(&self, user: &User, name_origin: Option<NameOrigin>) -> anyhow::Result<()> {
        let user_json = serde_json::to_string(user)?;
        let origin = match name_origin {
            Some(origin) => serde_json::to_string(&origin)?,
            None => String::new(),
        };
        self.backend
            .set_many(&[(USER_KEY, user_json.as_str()), (NAME_ORIGIN_KEY, origin.as_str())])
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.backend
            .remove_many(&[TOKEN_KEY, ISSUED_AT_KEY, USER_KEY, NAME_ORIGIN_KEY])
    }
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}
