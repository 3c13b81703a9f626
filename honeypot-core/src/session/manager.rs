//! Process-wide session store

use super::store::{Session, SessionSummary};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Longest accepted client-supplied session id, in characters
pub const MAX_SESSION_ID_CHARS: usize = 128;

/// Shared handle to one session. Holding the lock serializes every
/// mutation of that session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory sessions keyed by identifier.
///
/// The map lock is only taken for lookups and inserts and is never held
/// across an await point. Per-session work happens behind the session's
/// own async mutex.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    history_window: usize,
    adopt_client_ids: bool,
}

impl SessionStore {
    /// Create an empty store. `adopt_client_ids` controls what happens to an
    /// unknown client-supplied id: adopt it, or mint a fresh one.
    pub fn new(history_window: usize, adopt_client_ids: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history_window,
            adopt_client_ids,
        }
    }

    /// Find the session for `session_id`, creating one when the id is absent
    /// or unknown. Returns the id actually in use.
    pub fn get_or_create(&self, session_id: Option<&str>) -> (String, SessionHandle) {
        let requested = session_id.and_then(clean_id);

        if let Some(id) = &requested {
            if let Some(handle) = self.sessions.read().get(id) {
                return (id.clone(), handle.clone());
            }
        }

        let id = match requested {
            Some(id) if self.adopt_client_ids => id,
            _ => Uuid::new_v4().to_string(),
        };

        let mut sessions = self.sessions.write();
        // a concurrent request may have created it between the two locks
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "creating session");
                Arc::new(Mutex::new(Session::new(id.clone(), self.history_window)))
            })
            .clone();
        (id, handle)
    }

    /// Get a session if it exists
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Empty a session in place, keeping its id and handle. Requests already
    /// waiting on the handle continue against the fresh state. Creates the
    /// session when it does not exist. Must not be called while holding the
    /// session's lock.
    pub async fn reset(&self, session_id: &str) -> SessionHandle {
        let handle = self
            .sessions
            .write()
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id, self.history_window))))
            .clone();
        *handle.lock().await = Session::new(session_id, self.history_window);
        handle
    }

    /// Remove a session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    /// Summary of one session, if it exists
    pub async fn summary(&self, session_id: &str) -> Option<SessionSummary> {
        let handle = self.get(session_id)?;
        let session = handle.lock().await;
        Some(session.summary())
    }

    /// Evict sessions idle for at least `idle`. Returns the evicted ids.
    pub fn sweep(&self, idle: Duration) -> Vec<String> {
        self.sweep_at(Utc::now(), idle)
    }

    /// [`sweep`](Self::sweep) against an explicit clock reading.
    ///
    /// Sessions borrowed by an in-flight request are skipped: either their
    /// handle has been cloned out of the map or their lock is held.
    pub fn sweep_at(&self, now: DateTime<Utc>, idle: Duration) -> Vec<String> {
        let mut removed = Vec::new();
        self.sessions.write().retain(|id, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            let evict = match handle.try_lock() {
                Ok(session) => session.is_idle(now, idle),
                Err(_) => false,
            };
            if evict {
                removed.push(id.clone());
            }
            !evict
        });
        removed
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }
}

fn clean_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_SESSION_ID_CHARS).collect())
}
