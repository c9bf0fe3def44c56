//! One-stop construction of the broadcast core.

use std::sync::Arc;
use std::time::Duration;

use pulse_settings::RealtimeSettings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backfill::RecentActivityFetcher;
use crate::heartbeat::run_stale_sweep;
use crate::lifecycle::SessionLifecycleController;
use crate::publisher::ActivityPublisher;
use crate::registry::ConnectionRegistry;
use crate::subscriptions::SubscriptionManager;
use crate::traits::{AccessPolicy, ActivityStore, Transport};

/// The registry, index, publisher and lifecycle controller, sharing state.
///
/// Construct one per process and pass it by reference (or `Arc`) to
/// whatever needs it.
pub struct RealtimeHub {
    registry: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionManager>,
    publisher: Arc<ActivityPublisher>,
    lifecycle: Arc<SessionLifecycleController>,
    settings: RealtimeSettings,
}

impl RealtimeHub {
    /// Wire the core to its collaborators.
    pub fn new(
        settings: &RealtimeSettings,
        access: Arc<dyn AccessPolicy>,
        store: Arc<dyn ActivityStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let subscriptions = Arc::new(SubscriptionManager::new());
        let delivery_timeout = (settings.delivery_timeout_ms > 0)
            .then(|| Duration::from_millis(settings.delivery_timeout_ms));

        let publisher = Arc::new(ActivityPublisher::new(
            registry.clone(),
            subscriptions.clone(),
            transport,
            delivery_timeout,
        ));
        let lifecycle = Arc::new(SessionLifecycleController::new(
            registry.clone(),
            subscriptions.clone(),
            access,
            RecentActivityFetcher::new(store, settings.backfill_limit),
        ));

        Self {
            registry,
            subscriptions,
            publisher,
            lifecycle,
            settings: settings.clone(),
        }
    }

    /// Live sessions.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Subscription index.
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Event fan-out.
    pub fn publisher(&self) -> &Arc<ActivityPublisher> {
        &self.publisher
    }

    /// Inbound operations.
    pub fn lifecycle(&self) -> &Arc<SessionLifecycleController> {
        &self.lifecycle
    }

    /// Start the stale-session sweep if enabled in settings.
    pub fn spawn_stale_sweep(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let sweep = &self.settings.stale_sweep;
        if !sweep.enabled {
            return None;
        }
        let interval = Duration::from_secs(sweep.interval_secs.max(1));
        let stale_after = Duration::from_secs(sweep.stale_after_secs);
        info!(?interval, ?stale_after, "stale session sweep enabled");
        Some(tokio::spawn(run_stale_sweep(
            self.lifecycle.clone(),
            interval,
            stale_after,
            cancel,
        )))
    }
}
