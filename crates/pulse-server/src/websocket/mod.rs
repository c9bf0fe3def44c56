//! Websocket session loop and frame dispatch.

pub mod handler;
pub mod session;
