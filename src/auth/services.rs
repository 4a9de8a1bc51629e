use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::dto::{LoginResponse, User};
use super::guard::{self, GuardDecision};
use super::monitor::{ExpirationMonitor, Expiry};
use super::resolver::{IdentityResolver, Resolution};
use super::token_store::{Session, TokenStore};
use crate::api::{HttpIdentityApi, IdentityApi};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::storage::{FileStorage, KeyValueStore, MemoryStorage};

/// What the UI needs to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(User),
    /// A better display name or extra attributes were found.
    UserUpdated(User),
    LoggedOut,
    /// The session outlived its TTL; shown to the user before the forced logout.
    Expired,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

struct Inner {
    config: SessionConfig,
    store: TokenStore,
    api: Arc<dyn IdentityApi>,
    resolver: IdentityResolver,
    session: RwLock<Option<Session>>,
    loading: AtomicBool,
    monitor: Mutex<ExpirationMonitor>,
    events: broadcast::Sender<SessionEvent>,
}

/// Owns the client-side session: login, logout, rehydration, expiry and the
/// current user. Cheap to clone; every clone shares the same session.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<Inner>,
}

impl SessionService {
    pub fn new(config: SessionConfig, store: TokenStore, api: Arc<dyn IdentityApi>) -> Self {
        let (events, _) = broadcast::channel(32);
        let monitor = ExpirationMonitor::new(config.session_ttl, config.check_interval);
        Self {
            inner: Arc::new(Inner {
                resolver: IdentityResolver::new(api.clone()),
                config,
                store,
                api,
                session: RwLock::new(None),
                loading: AtomicBool::new(true),
                monitor: Mutex::new(monitor),
                events,
            }),
        }
    }

    /// HTTP client plus file storage when a path is configured, memory otherwise.
    pub fn from_config(config: SessionConfig) -> anyhow::Result<Self> {
        let api = Arc::new(HttpIdentityApi::new(
            &config.api_base_url,
            config.request_timeout(),
        )?) as Arc<dyn IdentityApi>;
        let backend = match &config.storage_path {
            Some(path) => Arc::new(FileStorage::new(path)) as Arc<dyn KeyValueStore>,
            None => Arc::new(MemoryStorage::new()) as Arc<dyn KeyValueStore>,
        };
        Ok(Self::new(config, TokenStore::new(backend), api))
    }

    /// Rehydrates the stored session at startup. Clears `is_loading` once the
    /// stored session has been accepted or rejected, then refines the name.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<User> {
        let now = OffsetDateTime::now_utc();
        let restored = match self.inner.store.load() {
            None => {
                debug!("no stored session");
                None
            }
            Some(session) if !session.is_valid_at(now, self.inner.config.session_ttl) => {
                info!(user_id = %session.user.id, "stored session expired; clearing");
                self.inner.clear_store();
                None
            }
            Some(session) => {
                info!(user_id = %session.user.id, role = ?session.user.role, "session restored");
                let pair = (session.token.clone(), session.user.clone());
                self.inner.install(session);
                Some(pair)
            }
        };
        self.inner.loading.store(false, Ordering::SeqCst);

        let (token, user) = restored?;
        self.inner.enrich(&token, user).await;
        self.current_user()
    }

    /// Signs in with the backend. The email is trimmed and lower-cased before
    /// it is validated and sent, so the backend always sees the normalized
    /// address; the password is passed through untouched.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(SessionError::InvalidInput("Invalid email".into()));
        }
        if password.is_empty() {
            return Err(SessionError::InvalidInput("Password is required".into()));
        }

        let LoginResponse { token, user } = match self.inner.api.login(&email, password).await {
            Ok(res) => res,
            Err(e) => {
                warn!(email = %email, error = %e, "login failed");
                return Err(e.into());
            }
        };
        if token.trim().is_empty() {
            warn!(user_id = %user.id, "login response carried no token");
            return Err(SessionError::Unavailable("login response carried no token".into()));
        }

        let session = self
            .inner
            .store
            .save(&token, &user)
            .map_err(SessionError::Storage)?;
        self.inner.install(session);
        self.inner.loading.store(false, Ordering::SeqCst);
        info!(user_id = %user.id, role = ?user.role, "user logged in");
        self.inner.emit(SessionEvent::LoggedIn(user.clone()));

        self.inner.enrich(&token, user.clone()).await;
        Ok(self.current_user().unwrap_or(user))
    }

    #[instrument(skip(self))]
    pub fn logout(&self) {
        let user_id = self.inner.read_session().as_ref().map(|s| s.user.id.clone());
        self.inner.end_session();
        info!(user_id = ?user_id, "user logged out");
        self.inner.emit(SessionEvent::LoggedOut);
    }

    /// Re-runs identity resolution for the active session.
    #[instrument(skip(self))]
    pub async fn refresh_identity(&self) -> Option<User> {
        let (token, user) = {
            let session = self.inner.read_session();
            let s = session.as_ref()?;
            (s.token.clone(), s.user.clone())
        };
        self.inner.enrich(&token, user).await;
        self.current_user()
    }

    fn valid_session(&self) -> Option<Session> {
        let now = OffsetDateTime::now_utc();
        self.inner
            .read_session()
            .as_ref()
            .filter(|s| s.is_valid_at(now, self.inner.config.session_ttl))
            .cloned()
    }

    pub fn current_user(&self) -> Option<User> {
        self.valid_session().map(|s| s.user)
    }

    /// Bearer token for the other API calls the UI makes.
    pub fn token(&self) -> Option<String> {
        self.valid_session().map(|s| s.token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.valid_session().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> Option<Duration> {
        let now = OffsetDateTime::now_utc();
        self.valid_session()
            .map(|s| s.remaining_at(now, self.inner.config.session_ttl))
    }

    pub fn guard(&self, path: &str) -> GuardDecision {
        guard::evaluate(self.current_user().map(|u| u.role), path)
    }

    pub fn home_path(&self) -> Option<&'static str> {
        self.current_user().map(|u| guard::home_path(u.role))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl Inner {
    fn read_session(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }

    fn monitor(&self) -> MutexGuard<'_, ExpirationMonitor> {
        self.monitor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
    }

    fn install(self: &Arc<Self>, session: Session) {
        *self.write_session() = Some(session);
        let weak: Weak<Inner> = Arc::downgrade(self);
        self.monitor().arm(self.store.clone(), move |expiry| {
            if let Some(inner) = weak.upgrade() {
                inner.on_expired(expiry);
            }
        });
    }

    fn end_session(&self) {
        self.monitor().disarm();
        self.clear_store();
        *self.write_session() = None;
    }

    fn on_expired(&self, expiry: Expiry) {
        match expiry {
            Expiry::TtlElapsed { issued_at } => {
                warn!(issued_at = %issued_at, "session expired; forcing logout");
                self.emit(SessionEvent::Expired);
            }
            Expiry::SessionMissing => {
                info!("stored session disappeared; logging out");
            }
        }
        self.end_session();
        self.emit(SessionEvent::LoggedOut);
    }

    async fn enrich(&self, token: &str, user: User) {
        let resolution = self.resolver.resolve(&user, token).await;
        if let Some(updated) = self.apply_resolution(token, &resolution) {
            self.emit(SessionEvent::UserUpdated(updated));
        }
    }

    /// Applies `resolution` if `token` is still the active session and it
    /// improves the cached user. Returns the updated user when it does.
    fn apply_resolution(&self, token: &str, resolution: &Resolution) -> Option<User> {
        let mut slot = self.write_session();
        let session = slot.as_mut().filter(|s| s.token == token)?;
        let before = session.user.clone();
        if !resolution.apply_to(&mut session.user, &mut session.name_origin) {
            return None;
        }
        if let Err(e) = self.store.update_user(&session.user, session.name_origin) {
            warn!(user_id = %session.user.id, error = %e, "failed to persist updated user");
        }
        if session.user == before {
            return None;
        }
        debug!(user_id = %session.user.id, origin = ?resolution.origin, "cached user updated");
        Some(session.user.clone())
    }
}
