//! Subscribe-time backfill.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use pulse_core::{ActivityEvent, ScopeKey, UserId};
use tracing::{debug, warn};

use crate::telemetry::BACKFILL_FAILURES_TOTAL;
use crate::traits::{ActivityQuery, ActivityStore};

/// Fetches activity a client missed while away.
///
/// Store failures never fail the subscription that asked for the backfill:
/// they are logged and produce an empty result.
#[derive(Clone)]
pub struct RecentActivityFetcher {
    store: Arc<dyn ActivityStore>,
    limit: usize,
}

impl RecentActivityFetcher {
    /// Fetcher returning at most `limit` activities per call.
    pub fn new(store: Arc<dyn ActivityStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
        }
    }

    /// Configured cap.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Activities on `scope` strictly after `since`, newest first, capped
    /// at the configured limit.
    pub async fn recent_activities(
        &self,
        user: UserId,
        scope: ScopeKey,
        since: Option<DateTime<Utc>>,
    ) -> Vec<ActivityEvent> {
        let query = ActivityQuery {
            user,
            scope,
            since,
            limit: self.limit,
        };

        let mut events = match self.store.query(&query).await {
            Ok(events) => events,
            Err(error) => {
                warn!(user_id = %user, %scope, %error, "backfill query failed, returning empty");
                counter!(BACKFILL_FAILURES_TOTAL).increment(1);
                return Vec::new();
            }
        };

        // Cursor, order and cap hold even if the store ignores them.
        events.retain(|e| e.matches(scope) && since.is_none_or(|cursor| e.timestamp > cursor));
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events.truncate(self.limit);

        debug!(user_id = %user, %scope, count = events.len(), "backfill served");
        events
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockActivityStore;
    use chrono::Duration;
    use pulse_core::{ActivityId, ActivityType, ProjectId, StoreError};

    fn event(id: i64, minutes_ago: i64, project: Option<i64>) -> ActivityEvent {
        ActivityEvent {
            id: ActivityId(id),
            activity_type: ActivityType::TaskUpdated,
            description: format!("event {id}"),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            actor_user_id: UserId(1),
            project_id: project.map(ProjectId),
            task_id: None,
            target_user_id: None,
        }
    }

    #[tokio::test]
    async fn store_error_yields_empty() {
        let mut store = MockActivityStore::new();
        let _ = store
            .expect_query()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("down".into())));
        let fetcher = RecentActivityFetcher::new(Arc::new(store), 20);

        let out = fetcher
            .recent_activities(UserId(10), ScopeKey::Global, Some(Utc::now()))
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn query_carries_user_scope_cursor_and_limit() {
        let since = Utc::now() - Duration::minutes(10);
        let mut store = MockActivityStore::new();
        let _ = store
            .expect_query()
            .withf(move |q| {
                q.user == UserId(10)
                    && q.scope == ScopeKey::Project(ProjectId(7))
                    && q.since == Some(since)
                    && q.limit == 5
            })
            .returning(|_| Ok(Vec::new()));
        let fetcher = RecentActivityFetcher::new(Arc::new(store), 5);

        let out = fetcher
            .recent_activities(UserId(10), ScopeKey::Project(ProjectId(7)), Some(since))
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn output_is_filtered_sorted_and_capped() {
        let since = Utc::now() - Duration::minutes(10);
        let mut store = MockActivityStore::new();
        let _ = store.expect_query().returning(|_| {
            Ok(vec![
                event(1, 8, Some(7)),
                event(2, 30, Some(7)),
                event(3, 2, Some(7)),
                event(4, 5, Some(3)),
                event(5, 1, Some(7)),
            ])
        });
        let fetcher = RecentActivityFetcher::new(Arc::new(store), 2);

        let out = fetcher
            .recent_activities(UserId(10), ScopeKey::Project(ProjectId(7)), Some(since))
            .await;
        let ids: Vec<i64> = out.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![5, 3]);
    }

    #[tokio::test]
    async fn no_cursor_returns_latest() {
        let mut store = MockActivityStore::new();
        let _ = store
            .expect_query()
            .returning(|_| Ok(vec![event(1, 100, None), event(2, 50, None)]));
        let fetcher = RecentActivityFetcher::new(Arc::new(store), 20);

        let out = fetcher
            .recent_activities(UserId(10), ScopeKey::Global, None)
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, ActivityId(2));
    }

    #[test]
    fn zero_limit_is_clamped() {
        let fetcher = RecentActivityFetcher::new(Arc::new(MockActivityStore::new()), 0);
        assert_eq!(fetcher.limit(), 1);
    }
}
