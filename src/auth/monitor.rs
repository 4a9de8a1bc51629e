use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::token_store::TokenStore;

/// Why the monitor ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The stored session outlived its TTL.
    TtlElapsed { issued_at: OffsetDateTime },
    /// Another process cleared the stored session.
    SessionMissing,
}

pub fn is_expired(issued_at: OffsetDateTime, now: OffsetDateTime, ttl: Duration) -> bool {
    let ttl = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
    now - issued_at >= ttl
}

/// Looks at the stored timestamp once.
pub fn check(store: &TokenStore, now: OffsetDateTime, ttl: Duration) -> Option<Expiry> {
    match store.issued_at() {
        None => Some(Expiry::SessionMissing),
        Some(issued_at) if is_expired(issued_at, now, ttl) => Some(Expiry::TtlElapsed { issued_at }),
        Some(_) => None,
    }
}

/// Periodic TTL check. Armed while a session exists; the timer task is aborted
/// on `disarm` and on drop.
#[derive(Debug)]
pub struct ExpirationMonitor {
    ttl: Duration,
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl ExpirationMonitor {
    pub fn new(ttl: Duration, period: Duration) -> Self {
        Self {
            ttl,
            period,
            handle: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Starts checking every `period`, first one `period` from now. Must run
    /// inside a tokio runtime. `on_expire` runs at most once, from the timer task.
    pub fn arm<F>(&mut self, store: TokenStore, on_expire: F)
    where
        F: FnOnce(Expiry) + Send + 'static,
    {
        self.disarm();
        let (ttl, period) = (self.ttl, self.period);
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let expiry = loop {
                ticker.tick().await;
                if let Some(expiry) = check(&store, OffsetDateTime::now_utc(), ttl) {
                    break expiry;
                }
            };
            debug!(?expiry, "expiration monitor fired");
            on_expire(expiry);
        }));
        debug!(period_secs = period.as_secs(), "expiration monitor armed");
    }

    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("expiration monitor disarmed");
        }
    }
}

impl Drop for ExpirationMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}
