//! # pulse-server
//!
//! Axum front end for the realtime core.
//!
//! - `GET /ws`: authenticated websocket sessions speaking the Pulse frame protocol
//! - `POST /api/activities`: service-to-service ingest that records and publishes
//! - `GET /health` and `GET /metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{AppState, PulseServer};
