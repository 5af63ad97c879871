//! Session cache and renewal.
//!
//! A cached session is only handed out again after the pad service confirms
//! it still has enough lifetime left; otherwise a new one is minted and
//! overwrites the slot.

use super::locks::KeyedLocks;
use super::remote::CollabRemote;
use super::store::SessionStore;
use super::BrokerError;
use crate::config::{SessionPolicy, SessionScopeKind};
use crate::models::{Document, SessionKey, User, UserSession};
use metrics::counter;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Decides which slot a (user, document) pair shares its session with.
pub trait SessionScope: Send + Sync {
    fn key(&self, user: &User, document: &Document) -> SessionKey;
}

/// One session per user, shared across documents.
pub struct PerUser;

impl SessionScope for PerUser {
    fn key(&self, user: &User, _document: &Document) -> SessionKey {
        SessionKey::for_user(user.id.as_str())
    }
}

/// One session per (user, document).
pub struct PerUserDocument;

impl SessionScope for PerUserDocument {
    fn key(&self, user: &User, document: &Document) -> SessionKey {
        SessionKey::for_user_document(user.id.as_str(), document.id.as_str())
    }
}

pub fn scope_for(kind: SessionScopeKind) -> Arc<dyn SessionScope> {
    match kind {
        SessionScopeKind::User => Arc::new(PerUser),
        SessionScopeKind::UserDocument => Arc::new(PerUserDocument),
    }
}

/// Source of "now" in whole epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Settable clock for tests.
#[derive(Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    remote: Arc<dyn CollabRemote>,
    policy: SessionPolicy,
    locks: KeyedLocks,
}

impl SessionCache {
    pub fn new(
        store: Arc<dyn SessionStore>,
        remote: Arc<dyn CollabRemote>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            policy,
            locks: KeyedLocks::new(),
        }
    }

    /// Session id to hand to the client for `key` in `group_id`.
    pub async fn acquire_session(
        &self,
        key: &SessionKey,
        author_id: &str,
        group_id: &str,
        now: i64,
    ) -> Result<String, BrokerError> {
        let slot = key.storage_key();
        let _guard = self.locks.lock(&slot).await;

        if let Some(existing) = self.store.find_session(key).await? {
            if self
                .remote
                .check_session_valid(now, &existing.remote_session_id, group_id)
                .await?
            {
                counter!("collab_sessions_total", "outcome" => "reused").increment(1);
                tracing::debug!(slot = %slot, "Reusing pad session");
                return Ok(existing.remote_session_id);
            }
            tracing::info!(
                slot = %slot,
                stale_session_id = %existing.remote_session_id,
                "Cached pad session no longer usable, renewing"
            );
        }

        let valid_until = self.policy.expiry_from(now);
        let session_id = self
            .remote
            .create_session(group_id, author_id, valid_until)
            .await?;

        self.store
            .upsert_session(UserSession::new(key, session_id.as_str(), group_id, valid_until))
            .await?;

        counter!("collab_sessions_total", "outcome" => "minted").increment(1);
        tracing::info!(slot = %slot, valid_until, "Minted pad session");
        Ok(session_id)
    }

    /// Local user holding a cached session.
    pub async fn session_holder(&self, remote_session_id: &str) -> Result<String, BrokerError> {
        self.store
            .find_session_by_remote_id(remote_session_id)
            .await?
            .map(|session| session.user_id)
            .ok_or_else(|| BrokerError::NotFound(format!("session {}", remote_session_id)))
    }
}
