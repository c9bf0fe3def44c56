//! # pulse-core
//!
//! Foundation types for the Pulse realtime activity broadcast core.
//!
//! This crate provides the vocabulary shared by every other Pulse crate:
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::SubscriptionId`] and the
//!   numeric entity IDs ([`ids::UserId`], [`ids::ProjectId`], [`ids::TaskId`])
//! - **Scopes**: [`scope::ScopeKey`], the closed set of broadcast channels
//! - **Activity events**: [`activity::ActivityEvent`] and its closed
//!   [`activity::ActivityType`] enum
//! - **Presentation**: the exhaustive icon/priority/color table and the
//!   derived [`presentation::BroadcastMessage`]
//! - **Protocol**: client and server websocket frames
//! - **Auth context**: [`auth::Principal`] and [`auth::SessionContext`]
//! - **Errors**: [`errors::RealtimeError`], [`errors::DeliveryError`],
//!   [`errors::StoreError`]
//! - **Logging**: [`logging::init_subscriber`]

#![deny(unsafe_code)]

pub mod activity;
pub mod auth;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod presentation;
pub mod protocol;
pub mod scope;

pub use activity::{ActivityEvent, ActivityType};
pub use auth::{Principal, SessionContext};
pub use errors::{DeliveryError, RealtimeError, Result, StoreError};
pub use ids::{ActivityId, ProjectId, SessionId, SubscriptionId, TaskId, UserId};
pub use presentation::{BroadcastMessage, Presentation, Priority};
pub use protocol::{AckStatus, ClientFrame, ServerFrame};
pub use scope::{AccessTarget, ScopeKey};
