//! Scope ↔ session subscription index.
//!
//! Two maps describe the same relation:
//!
//! - forward: scope → sessions subscribed to it (fan-out lookups)
//! - reverse: session → scopes it holds, each with its subscription ID
//!   (O(k) cleanup on disconnect)
//!
//! Both maps live behind a single `RwLock` and every mutation updates both
//! before the guard is released, so no reader can observe them disagreeing.
//! Each critical section is a handful of hash operations with no `.await`
//! inside, so a single lock stays uncontended at interactive-client scale.
//! Scopes whose subscriber set becomes empty are removed from the forward
//! map; sessions with no scopes are removed from the reverse map.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use pulse_core::{ScopeKey, SessionId, SubscriptionId};

#[derive(Debug, Default)]
struct Index {
    by_scope: HashMap<ScopeKey, HashSet<SessionId>>,
    by_session: HashMap<SessionId, HashMap<ScopeKey, SubscriptionId>>,
}

/// Result of [`SubscriptionManager::subscribe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribed {
    /// Handle for the (session, scope) pair. Stable across repeat
    /// subscribes.
    pub id: SubscriptionId,
    /// `false` when the pair already existed.
    pub created: bool,
}

/// Bidirectional subscription index.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    index: RwLock<Index>,
}

impl SubscriptionManager {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `session` to `scope`. Idempotent.
    pub fn subscribe(&self, session: &SessionId, scope: ScopeKey) -> Subscribed {
        let mut index = self.index.write();
        let held = index.by_session.entry(session.clone()).or_default();
        if let Some(id) = held.get(&scope) {
            return Subscribed {
                id: id.clone(),
                created: false,
            };
        }
        let id = SubscriptionId::new();
        let _ = held.insert(scope, id.clone());
        let _ = index
            .by_scope
            .entry(scope)
            .or_default()
            .insert(session.clone());
        Subscribed { id, created: true }
    }

    /// Unsubscribe `session` from `scope`. Idempotent.
    ///
    /// Returns whether a subscription was removed.
    pub fn unsubscribe(&self, session: &SessionId, scope: ScopeKey) -> bool {
        let mut index = self.index.write();
        let Some(held) = index.by_session.get_mut(session) else {
            return false;
        };
        if held.remove(&scope).is_none() {
            return false;
        }
        if held.is_empty() {
            let _ = index.by_session.remove(session);
        }
        Self::detach_from_scope(&mut index.by_scope, session, scope);
        true
    }

    /// Drop every subscription held by `session`, walking only that
    /// session's scopes.
    ///
    /// Returns the number of subscriptions removed.
    pub fn unsubscribe_all(&self, session: &SessionId) -> usize {
        let mut index = self.index.write();
        let Some(held) = index.by_session.remove(session) else {
            return 0;
        };
        for scope in held.keys() {
            Self::detach_from_scope(&mut index.by_scope, session, *scope);
        }
        held.len()
    }

    fn detach_from_scope(
        by_scope: &mut HashMap<ScopeKey, HashSet<SessionId>>,
        session: &SessionId,
        scope: ScopeKey,
    ) {
        if let Some(members) = by_scope.get_mut(&scope) {
            let _ = members.remove(session);
            if members.is_empty() {
                let _ = by_scope.remove(&scope);
            }
        }
    }

    /// Point-in-time copy of the sessions subscribed to `scope`.
    ///
    /// Later mutations do not affect the returned vector.
    pub fn subscribers_of(&self, scope: ScopeKey) -> Vec<SessionId> {
        self.index
            .read()
            .by_scope
            .get(&scope)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Scopes `session` currently holds.
    pub fn scopes_of(&self, session: &SessionId) -> Vec<ScopeKey> {
        self.index
            .read()
            .by_session
            .get(session)
            .map(|held| held.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Subscription ID for a (session, scope) pair.
    pub fn subscription_id(&self, session: &SessionId, scope: ScopeKey) -> Option<SubscriptionId> {
        self.index
            .read()
            .by_session
            .get(session)
            .and_then(|held| held.get(&scope).cloned())
    }

    /// Whether `session` is subscribed to `scope`.
    pub fn is_subscribed(&self, session: &SessionId, scope: ScopeKey) -> bool {
        self.index
            .read()
            .by_scope
            .get(&scope)
            .is_some_and(|members| members.contains(session))
    }

    /// Number of scopes `session` holds.
    pub fn count_for(&self, session: &SessionId) -> usize {
        self.index
            .read()
            .by_session
            .get(session)
            .map_or(0, HashMap::len)
    }

    /// Number of scopes with at least one subscriber.
    pub fn scope_count(&self) -> usize {
        self.index.read().by_scope.len()
    }

    /// Total (session, scope) pairs.
    pub fn subscription_count(&self) -> usize {
        self.index.read().by_session.values().map(HashMap::len).sum()
    }

    /// Check that the two maps describe the same relation and hold no empty
    /// entries.
    pub fn is_consistent(&self) -> bool {
        let index = self.index.read();
        let forward_ok = index.by_scope.iter().all(|(scope, members)| {
            !members.is_empty()
                && members.iter().all(|s| {
                    index
                        .by_session
                        .get(s)
                        .is_some_and(|held| held.contains_key(scope))
                })
        });
        let reverse_ok = index.by_session.iter().all(|(session, held)| {
            !held.is_empty()
                && held.keys().all(|scope| {
                    index
                        .by_scope
                        .get(scope)
                        .is_some_and(|members| members.contains(session))
                })
        });
        forward_ok && reverse_ok
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
