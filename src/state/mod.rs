//! Session store
//!
//! Holds one `DialogueState` per session id. Each session sits behind its own
//! mutex so a turn's read-modify-write is atomic per session while different
//! sessions proceed concurrently.

use crate::models::DialogueState;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub type SessionHandle = Arc<Mutex<DialogueState>>;

/// In-process session registry
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle for `session_id`, created `Idle` on first use.
    pub async fn acquire(&self, session_id: &str) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "New session");
                Arc::new(Mutex::new(DialogueState::default()))
            })
            .clone()
    }

    /// Copy of the current state, if the session exists
    pub async fn snapshot(&self, session_id: &str) -> Option<DialogueState> {
        let handle = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()?
        };
        let state = handle.lock().await;
        Some(state.clone())
    }

    /// Put a session back to `Idle`, dropping any in-progress portfolio.
    /// Returns false when the session doesn't exist.
    pub async fn reset(&self, session_id: &str) -> bool {
        let handle = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(handle) => handle.clone(),
                None => return false,
            }
        };
        *handle.lock().await = DialogueState::default();
        info!(session_id, "Session reset");
        true
    }

    /// Drop sessions untouched for longer than `max_age`. Sessions held by
    /// a turn, locked or merely acquired, are skipped.
    pub async fn evict_idle(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| {
            // The map holds one reference; any other belongs to a turn
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(state) => state.updated_at >= cutoff,
                Err(_) => true,
            }
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DialogueMode, PortfolioEntry};

    #[tokio::test]
    async fn test_acquire_creates_idle_session_once() {
        let store = SessionStore::new();

        let first = store.acquire("alice").await;
        let second = store.acquire("alice").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().await.mode, DialogueMode::Idle);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();

        store.acquire("alice").await.lock().await.mode = DialogueMode::Saving;

        let bob = store.snapshot("bob").await;
        assert!(bob.is_none());
        store.acquire("bob").await;
        assert_eq!(store.snapshot("bob").await.unwrap().mode, DialogueMode::Idle);
        assert_eq!(store.snapshot("alice").await.unwrap().mode, DialogueMode::Saving);
    }

    #[tokio::test]
    async fn test_reset() {
        let store = SessionStore::new();
        {
            let handle = store.acquire("alice").await;
            let mut state = handle.lock().await;
            state.mode = DialogueMode::Saving;
            state.pending_entry = Some(PortfolioEntry::new("bitcoin", 1.0));
        }

        assert!(store.reset("alice").await);
        assert!(!store.reset("nobody").await);

        let state = store.snapshot("alice").await.unwrap();
        assert_eq!(state.mode, DialogueMode::Idle);
        assert!(state.pending_entry.is_none());
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_recent_sessions() {
        let store = SessionStore::new();
        store.acquire("fresh").await;
        store.acquire("stale").await.lock().await.updated_at = Utc::now() - Duration::hours(2);

        let evicted = store.evict_idle(Duration::minutes(30)).await;

        assert_eq!(evicted, 1);
        assert!(store.snapshot("stale").await.is_none());
        assert!(store.snapshot("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_evict_skips_locked_sessions() {
        let store = SessionStore::new();
        let handle = store.acquire("busy").await;
        let mut guard = handle.lock().await;
        guard.updated_at = Utc::now() - Duration::hours(2);

        assert_eq!(store.evict_idle(Duration::minutes(30)).await, 0);
        drop(guard);
        assert_eq!(store.evict_idle(Duration::minutes(30)).await, 0);
        drop(handle);
        assert_eq!(store.evict_idle(Duration::minutes(30)).await, 1);
    }

    #[tokio::test]
    async fn test_evict_skips_acquired_but_unlocked_sessions() {
        let store = SessionStore::new();
        store.acquire("alice").await.lock().await.updated_at = Utc::now() - Duration::hours(2);

        // A turn has claimed the session but not yet locked it
        let claimed = store.acquire("alice").await;
        assert_eq!(store.evict_idle(Duration::minutes(30)).await, 0);

        claimed.lock().await.mode = DialogueMode::Saving;
        drop(claimed);

        let state = store.snapshot("alice").await.unwrap();
        assert_eq!(state.mode, DialogueMode::Saving);
    }
}
