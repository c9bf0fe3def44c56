//! # pulse-realtime
//!
//! The realtime activity broadcast core.
//!
//! Components, leaves first:
//!
//! - [`ConnectionRegistry`]: live sessions and their last activity
//! - [`SubscriptionManager`]: scope ↔ session index
//! - [`RecentActivityFetcher`]: backfill against the activity store
//! - [`HeartbeatMonitor`]: liveness bookkeeping, plus the opt-in stale sweep
//! - [`ActivityPublisher`]: scope resolution and per-recipient async delivery
//! - [`SessionLifecycleController`]: connect / subscribe / unsubscribe /
//!   disconnect as atomic multi-index operations
//!
//! The outside world is reached only through the traits in [`traits`]:
//! authorization ([`AccessPolicy`]), history ([`ActivityStore`]) and
//! outbound frames ([`Transport`]). [`memory`] and [`transport`] provide
//! in-process implementations; [`RealtimeHub`] wires everything together.

#![deny(unsafe_code)]

pub mod backfill;
pub mod heartbeat;
pub mod hub;
pub mod lifecycle;
pub mod memory;
pub mod publisher;
pub mod registry;
pub mod subscriptions;
pub mod telemetry;
pub mod traits;
pub mod transport;

pub use backfill::RecentActivityFetcher;
pub use heartbeat::{HeartbeatMonitor, run_stale_sweep, sweep_stale_sessions};
pub use hub::RealtimeHub;
pub use lifecycle::{
    DisconnectSummary, SessionLifecycleController, SessionPhase, SubscribeOutcome,
    UnsubscribeOutcome, UnsubscribeTarget,
};
pub use memory::{InMemoryActivityStore, MembershipPolicy};
pub use publisher::{ActivityPublisher, PublishReport};
pub use registry::{ConnectionRegistry, Session};
pub use subscriptions::{Subscribed, SubscriptionManager};
pub use traits::{AccessPolicy, ActivityQuery, ActivityStore, Recipient, Transport};
pub use transport::ChannelTransport;
