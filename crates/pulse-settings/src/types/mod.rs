//! Settings type definitions.
//!
//! JSON keys are camelCase. Every struct is `#[serde(default)]`, so a
//! settings file may contain any subset of keys.

mod access;
mod realtime;
mod server;

pub use access::*;
pub use realtime::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings for the Pulse gateway.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "realtime": { "backfillLimit": 50 },
///   "auth": { "tokens": { "dev-token": 10 } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    /// Listener and per-connection limits.
    pub server: ServerSettings,
    /// Broadcast core tuning.
    pub realtime: RealtimeSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Token-to-principal mapping.
    pub auth: AuthSettings,
    /// Static authorization rules.
    pub access: AccessSettings,
}

impl PulseSettings {
    /// Reject combinations that parse but cannot work.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::SettingsError::InvalidValue;

        if self.server.outbound_buffer == 0 {
            return Err(InvalidValue("server.outboundBuffer must be at least 1".into()));
        }
        if self.realtime.backfill_limit == 0 {
            return Err(InvalidValue("realtime.backfillLimit must be at least 1".into()));
        }
        if self.realtime.stale_sweep.enabled && self.realtime.stale_sweep.interval_secs == 0 {
            return Err(InvalidValue(
                "realtime.staleSweep.intervalSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(PulseSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_backfill_limit_rejected() {
        let mut s = PulseSettings::default();
        s.realtime.backfill_limit = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("backfillLimit"));
    }

    #[test]
    fn zero_outbound_buffer_rejected() {
        let mut s = PulseSettings::default();
        s.server.outbound_buffer = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn enabled_sweep_needs_interval() {
        let mut s = PulseSettings::default();
        s.realtime.stale_sweep.enabled = true;
        s.realtime.stale_sweep.interval_secs = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let s: PulseSettings =
            serde_json::from_str(r#"{"logging":{"json":true}}"#).unwrap();
        assert!(s.logging.json);
        assert_eq!(s.logging.level, "info");
        assert_eq!(s.server, ServerSettings::default());
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(PulseSettings::default()).unwrap();
        assert!(v["server"].get("outboundBuffer").is_some());
        assert!(v["realtime"].get("backfillLimit").is_some());
        assert!(v["realtime"]["staleSweep"].get("staleAfterSecs").is_some());
    }
}
