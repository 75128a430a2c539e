//! Streamable-HTTP session store and reaper.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How often the reaper sweeps for expired sessions.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

const SESSION_ID_BYTES: usize = 16;

/// Server-side state for one logical streamable-HTTP client.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: Instant,
    pub last_seen_at: Instant,
    pub active: bool,
}

impl Session {
    /// Idle for at least `timeout` as of `now`.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen_at) >= timeout
    }
}

/// Session table guarded by a reader/writer lock.
///
/// Validation takes the read lock; create, touch and reap take the write
/// lock. Only [`SessionStore::reap_expired`] removes entries.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a session with a fresh 128-bit random id.
    pub fn create(&self) -> String {
        self.create_at(Instant::now())
    }

    pub fn create_at(&self, now: Instant) -> String {
        let id = super::random_token(SESSION_ID_BYTES);
        let session = Session {
            id: id.clone(),
            created_at: now,
            last_seen_at: now,
            active: true,
        };
        self.sessions.write().insert(id.clone(), session);
        debug!(session_id = %id, "Session created");
        id
    }

    /// Whether `id` names an active session that has not expired.
    pub fn is_valid(&self, id: &str) -> bool {
        self.is_valid_at(id, Instant::now())
    }

    pub fn is_valid_at(&self, id: &str, now: Instant) -> bool {
        self.sessions
            .read()
            .get(id)
            .is_some_and(|s| s.active && !s.is_expired(now, self.timeout))
    }

    /// Refresh `last_seen_at`. Returns `false` if the session is gone.
    pub fn touch(&self, id: &str) -> bool {
        self.touch_at(id, Instant::now())
    }

    pub fn touch_at(&self, id: &str, now: Instant) -> bool {
        match self.sessions.write().get_mut(id) {
            Some(session) => {
                session.last_seen_at = now;
                true
            }
            None => false,
        }
    }

    /// Validate and, when valid, refresh the session.
    ///
    /// Check and refresh happen under one write lock, so a concurrent reap
    /// cannot remove the session in between.
    pub fn validate(&self, id: &str) -> bool {
        self.validate_at(id, Instant::now())
    }

    pub fn validate_at(&self, id: &str, now: Instant) -> bool {
        match self.sessions.write().get_mut(id) {
            Some(session) if session.active && !session.is_expired(now, self.timeout) => {
                session.last_seen_at = now;
                true
            }
            _ => false,
        }
    }

    /// Remove every expired session, returning how many were dropped.
    pub fn reap_expired(&self) -> usize {
        self.reap_expired_at(Instant::now())
    }

    pub fn reap_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = !session.is_expired(now, self.timeout);
            if !keep {
                info!(session_id = %id, "Cleaned up expired session");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Spawn the periodic reaper. It stops when `shutdown` is cancelled.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; nothing can be expired yet.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Session reaper stopping due to shutdown");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.reap_expired();
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "Session sweep finished");
                        }
                    }
                }
            }
        })
    }
}
