//! Live session registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::gauge;
use parking_lot::{Mutex, RwLock};
use pulse_core::{RealtimeError, SessionId, UserId};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

use crate::lifecycle::SessionPhase;
use crate::telemetry::SESSIONS_ACTIVE;

/// One live client connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    connected_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
    /// Serializes lifecycle transitions for this session. Held across the
    /// index updates of subscribe, unsubscribe and disconnect.
    pub(crate) phase: tokio::sync::Mutex<SessionPhase>,
    /// Fired once the session is disconnected, whoever initiated it.
    closed: CancellationToken,
}

impl Session {
    fn new(id: SessionId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            connected_at: now,
            last_activity: Mutex::new(now),
            phase: tokio::sync::Mutex::new(SessionPhase::Connecting),
            closed: CancellationToken::new(),
        }
    }

    /// Session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Owning user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Registration time.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Last time the session was touched.
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    /// Resolves when the session has been torn down.
    ///
    /// The transport side waits on this so a disconnect it did not start
    /// (a stale sweep) still closes the connection.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Whether the session has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.cancel();
    }

    fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }
}

/// Registry of live sessions keyed by ID.
///
/// Owned by the server process and shared by `Arc`; every method takes
/// `&self` and is safe under arbitrary concurrent use.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// Fails with [`RealtimeError::DuplicateSession`] when the ID is taken;
    /// the existing record is left untouched.
    pub fn register(&self, id: SessionId, user_id: UserId) -> Result<Arc<Session>, RealtimeError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return Err(RealtimeError::DuplicateSession(id));
        }
        let session = Arc::new(Session::new(id.clone(), user_id));
        let _ = sessions.insert(id, session.clone());
        drop(sessions);

        gauge!(SESSIONS_ACTIVE).increment(1.0);
        debug!(session_id = %session.id, user_id = %user_id, "session registered");
        Ok(session)
    }

    /// Record activity. Unknown sessions are ignored with a warning.
    ///
    /// Returns whether the session was found.
    pub fn touch(&self, id: &SessionId) -> bool {
        if let Some(session) = self.sessions.read().get(id) {
            session.touch();
            true
        } else {
            warn!(session_id = %id, "touch for unknown session");
            false
        }
    }

    /// Remove by ID, returning the removed record.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if removed.is_some() {
            gauge!(SESSIONS_ACTIVE).decrement(1.0);
        }
        removed
    }

    /// Remove `session` only if it is still the record registered under its
    /// ID. A newer session that reused the ID is left alone.
    pub fn remove_exact(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(&session.id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                let _ = sessions.remove(&session.id);
                drop(sessions);
                gauge!(SESSIONS_ACTIVE).decrement(1.0);
                true
            }
            _ => false,
        }
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Owning user of a live session.
    pub fn user_of(&self, id: &SessionId) -> Option<UserId> {
        self.sessions.read().get(id).map(|s| s.user_id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Sessions whose last activity is at or before `cutoff`.
    pub fn idle_since(&self, cutoff: DateTime<Utc>) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.last_activity() <= cutoff)
            .cloned()
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn register_and_lookup() {
        let reg = ConnectionRegistry::new();
        let s = reg.register("sess-1".into(), UserId(10)).unwrap();
        assert_eq!(s.id().as_str(), "sess-1");
        assert_eq!(reg.user_of(&"sess-1".into()), Some(UserId(10)));
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&"sess-1".into()));
    }

    #[test]
    fn duplicate_is_rejected_and_original_kept() {
        let reg = ConnectionRegistry::new();
        let first = reg.register("sess-1".into(), UserId(10)).unwrap();
        assert_matches!(
            reg.register("sess-1".into(), UserId(99)),
            Err(RealtimeError::DuplicateSession(id)) if id.as_str() == "sess-1"
        );
        let current = reg.get(&"sess-1".into()).unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.user_id(), UserId(10));
    }

    #[test]
    fn touch_updates_last_activity() {
        let reg = ConnectionRegistry::new();
        let s = reg.register("sess-1".into(), UserId(10)).unwrap();
        let before = s.last_activity();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(reg.touch(&"sess-1".into()));
        assert!(s.last_activity() > before);
    }

    #[test]
    fn touch_unknown_is_noop() {
        let reg = ConnectionRegistry::new();
        assert!(!reg.touch(&"ghost".into()));
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_returns_record_once() {
        let reg = ConnectionRegistry::new();
        let _ = reg.register("sess-1".into(), UserId(10)).unwrap();
        let removed = reg.remove(&"sess-1".into()).unwrap();
        assert_eq!(removed.user_id(), UserId(10));
        assert!(reg.remove(&"sess-1".into()).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_exact_spares_reused_id() {
        let reg = ConnectionRegistry::new();
        let old = reg.register("sess-1".into(), UserId(10)).unwrap();
        let _ = reg.remove(&"sess-1".into());
        let newer = reg.register("sess-1".into(), UserId(10)).unwrap();

        assert!(!reg.remove_exact(&old));
        assert!(reg.contains(&"sess-1".into()));
        assert!(reg.remove_exact(&newer));
        assert!(reg.is_empty());
    }

    #[test]
    fn idle_since_filters_by_cutoff() {
        let reg = ConnectionRegistry::new();
        let _ = reg.register("a".into(), UserId(1)).unwrap();
        let _ = reg.register("b".into(), UserId(2)).unwrap();
        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(reg.idle_since(past).is_empty());
        assert_eq!(reg.idle_since(Utc::now()).len(), 2);
    }

    #[test]
    fn concurrent_register_and_remove() {
        let reg = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = SessionId::from(format!("t{t}-{i}"));
                        let _ = reg.register(id.clone(), UserId(t)).unwrap();
                        let _ = reg.touch(&id);
                        if i % 2 == 0 {
                            assert!(reg.remove(&id).is_some());
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 8 * 100);
    }
}
