//! Process-wide table of live relay sessions.
//!
//! Entries are independent and short-lived, so a single mutex over the map
//! is enough. The table is only ever keyed by session id.

use crate::{error::RegistryError, state::SessionState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Point-in-time view of one session, as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub stream_sid: Option<String>,
    pub call_sid: Option<String>,
    pub conversation_id: Option<String>,
    pub frames_to_ai: u64,
    pub frames_to_telephony: u64,
    pub created_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: SessionState::AwaitingStart,
            stream_sid: None,
            call_sid: None,
            conversation_id: None,
            frames_to_ai: 0,
            frames_to_telephony: 0,
            created_at: Utc::now(),
        }
    }
}

struct Entry {
    snapshot: SessionSnapshot,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. Ids must be unique among live sessions.
    pub fn register(
        &self,
        snapshot: SessionSnapshot,
        cancel: CancellationToken,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.inner.lock();
        let id = snapshot.session_id;
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }
        sessions.insert(id, Entry { snapshot, cancel });
        Ok(())
    }

    /// Removes a session, returning its last snapshot if it was present.
    pub fn deregister(&self, session_id: Uuid) -> Option<SessionSnapshot> {
        self.inner
            .lock()
            .remove(&session_id)
            .map(|entry| entry.snapshot)
    }

    pub fn find(&self, session_id: Uuid) -> Option<SessionSnapshot> {
        self.inner
            .lock()
            .get(&session_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Applies `f` to a live session's snapshot. Returns false if absent.
    pub fn update(&self, session_id: Uuid, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        match self.inner.lock().get_mut(&session_id) {
            Some(entry) => {
                f(&mut entry.snapshot);
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<_> = self
            .inner
            .lock()
            .values()
            .map(|entry| entry.snapshot.clone())
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Signals every live session to shut down. Sessions deregister
    /// themselves as they finish; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let sessions = self.inner.lock();
        for entry in sessions.values() {
            entry.cancel.cancel();
        }
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_find_deregister() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();

        registry
            .register(SessionSnapshot::new(id), CancellationToken::new())
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(id).unwrap().state, SessionState::AwaitingStart);

        let removed = registry.deregister(id).unwrap();
        assert_eq!(removed.session_id, id);
        assert!(registry.find(id).is_none());
        assert!(registry.deregister(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry
            .register(SessionSnapshot::new(id), CancellationToken::new())
            .unwrap();

        let err = registry
            .register(SessionSnapshot::new(id), CancellationToken::new())
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSession(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_only_touches_live_sessions() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry
            .register(SessionSnapshot::new(id), CancellationToken::new())
            .unwrap();

        assert!(registry.update(id, |s| s.stream_sid = Some("SS1".to_string())));
        assert_eq!(registry.find(id).unwrap().stream_sid.as_deref(), Some("SS1"));
        assert!(!registry.update(Uuid::new_v4(), |s| s.frames_to_ai += 1));
    }

    #[test]
    fn test_cancel_all_signals_every_session() {
        let registry = SessionRegistry::new();
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();
        for token in &tokens {
            registry
                .register(SessionSnapshot::new(Uuid::new_v4()), token.clone())
                .unwrap();
        }

        assert_eq!(registry.cancel_all(), 3);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
    }

    #[test]
    fn test_concurrent_register_and_deregister() {
        let registry = SessionRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let id = Uuid::new_v4();
                        registry
                            .register(SessionSnapshot::new(id), CancellationToken::new())
                            .unwrap();
                        assert!(registry.find(id).is_some());
                        assert!(registry.deregister(id).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
