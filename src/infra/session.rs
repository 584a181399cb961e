//! In-memory session registry bridging the out-of-band prover and the
//! polling HTTP consumer
//!
//! A session is write-once, read-once: the proof-producing actor `put`s
//! `(session_id, identity)` whenever its own flow completes, and a
//! polling reader `take`s it at most once. Entries have no TTL; an
//! un-consumed session lives until process restart, which is an accepted
//! bound for short-lived handshake artifacts.
//!
//! `take` never blocks the process: the bounded wait is a cooperative
//! suspension through `tokio::time`, woken early by `tokio::sync::Notify`
//! when a writer lands. Tests run under virtual time
//! (`#[tokio::test(start_paused = true)]`) so no real sleeping happens.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::time::{self, Instant};

use crate::domain::{Identity, SessionId};
use crate::infra::{Result, ServiceError};

/// Default polling budget: 5 checks, 1s apart.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Registry of live handshake sessions.
pub struct SessionRegistry {
    entries: Mutex<HashMap<SessionId, Identity>>,
    notify: Notify,
    max_attempts: u32,
    poll_interval: Duration,
}

impl SessionRegistry {
    /// Create a registry with an explicit polling budget.
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            max_attempts: max_attempts.max(1),
            poll_interval,
        }
    }

    /// Registry with the default 5 x 1s budget.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }

    /// Register an identity for a session.
    ///
    /// Unconditional upsert: a second write before consumption silently
    /// overwrites the previous identity. Wakes any waiting reader.
    pub fn put(&self, session_id: SessionId, identity: Identity) {
        let replaced = {
            let mut entries = self.entries.lock().expect("session registry lock poisoned");
            entries.insert(session_id.clone(), identity)
        };

        if replaced.is_some() {
            tracing::debug!(%session_id, "session overwritten before consumption");
        } else {
            tracing::debug!(%session_id, "session registered");
        }

        self.notify.notify_waiters();
    }

    /// Consume the identity for a session, polling up to the configured
    /// budget.
    ///
    /// On the first hit the entry is atomically removed, so a second
    /// `take` for the same id always fails. After `max_attempts` checks
    /// spaced `poll_interval` apart without a hit, fails with
    /// `SessionNotFound`.
    pub async fn take(&self, session_id: &SessionId) -> Result<Identity> {
        let mut attempt = 1u32;
        loop {
            // Arm the wakeup before checking, so a concurrent put cannot
            // slip between check and wait.
            let notified = self.notify.notified();
            tokio::pin!(notified);

            if let Some(identity) = self.remove(session_id) {
                tracing::debug!(%session_id, attempt, "session consumed");
                return Ok(identity);
            }

            if attempt >= self.max_attempts {
                tracing::debug!(%session_id, attempt, "session polling budget exhausted");
                return Err(ServiceError::SessionNotFound(session_id.clone()));
            }

            // Wait out one interval. Writers for other sessions wake us
            // too; those re-checks must not consume the attempt budget,
            // so keep waiting until the interval deadline passes.
            let deadline = Instant::now() + self.poll_interval;
            loop {
                match time::timeout_at(deadline, notified.as_mut()).await {
                    Ok(()) => {
                        if let Some(identity) = self.remove(session_id) {
                            tracing::debug!(%session_id, attempt, "session consumed");
                            return Ok(identity);
                        }
                        notified.set(self.notify.notified());
                    }
                    Err(_) => break,
                }
            }

            attempt += 1;
        }
    }

    /// Number of live (un-consumed) sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("session registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, session_id: &SessionId) -> Option<Identity> {
        let mut entries = self.entries.lock().expect("session registry lock poisoned");
        entries.remove(session_id)
    }
}

/// Process-lifetime record of identities produced by a verification or
/// session-redemption step.
///
/// Backs the claim gate: reward claims are only reachable with an
/// identity present here, unless the deployment explicitly runs in the
/// reduced-trust mode.
pub struct VerifiedIdentities {
    inner: RwLock<HashSet<Identity>>,
}

impl VerifiedIdentities {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashSet::new()),
        }
    }

    /// Record an identity as verified.
    pub async fn mark(&self, identity: Identity) {
        self.inner.write().await.insert(identity);
    }

    pub async fn contains(&self, identity: &Identity) -> bool {
        self.inner.read().await.contains(identity)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for VerifiedIdentities {
    fn default() -> Self {
        Self::new()
    }
}
