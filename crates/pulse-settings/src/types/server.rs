//! Listener and connection settings.

use serde::{Deserialize, Serialize};

/// HTTP/websocket listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port. `0` picks a free port.
    pub port: u16,
    /// Upper bound on simultaneous websocket sessions.
    pub max_connections: usize,
    /// Frames buffered per session before deliveries are dropped.
    pub outbound_buffer: usize,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds without a pong before the socket is closed.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8740,
            max_connections: 512,
            outbound_buffer: 256,
            max_message_size: 64 * 1024,
            ping_interval_secs: 30,
            pong_timeout_secs: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 8740);
        assert_eq!(s.outbound_buffer, 256);
        assert_eq!(s.max_message_size, 65_536);
        assert!(s.pong_timeout_secs > s.ping_interval_secs);
    }
}
