//! Server configuration.

use std::time::Duration;

use pulse_settings::ServerSettings;

/// Runtime configuration for [`crate::PulseServer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind; `0` picks a free one.
    pub port: u16,
    /// Concurrent websocket sessions before upgrades are refused.
    pub max_connections: usize,
    /// Frames buffered per session before deliveries are dropped.
    pub outbound_buffer: usize,
    /// Largest inbound websocket message accepted.
    pub max_message_size: usize,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Silence after which a client is considered gone.
    pub pong_timeout: Duration,
}

impl ServerConfig {
    /// `host:port` as given.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            outbound_buffer: s.outbound_buffer,
            max_message_size: s.max_message_size,
            ping_interval: Duration::from_secs(s.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(s.pong_timeout_secs.max(1)),
        }
    }
}

impl Default for ServerConfig {
    /// Settings defaults on an ephemeral port.
    fn default() -> Self {
        Self {
            port: 0,
            ..Self::from(&ServerSettings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_ephemeral() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn from_settings_converts_durations() {
        let settings = ServerSettings {
            ping_interval_secs: 5,
            pong_timeout_secs: 15,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.port, 8740);
        assert_eq!(cfg.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.pong_timeout, Duration::from_secs(15));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let settings = ServerSettings {
            ping_interval_secs: 0,
            pong_timeout_secs: 0,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.ping_interval, Duration::from_secs(1));
        assert_eq!(cfg.pong_timeout, Duration::from_secs(1));
    }

    #[test]
    fn listen_addr_joins_host_and_port() {
        let cfg = ServerConfig {
            host: "0.0.0.0".into(),
            port: 9090,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.listen_addr(), "0.0.0.0:9090");
    }
}
