//! Broadcast core tuning.

use serde::{Deserialize, Serialize};

/// Settings consumed by the realtime hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Most activities returned by one backfill.
    pub backfill_limit: usize,
    /// Activities the standalone gateway keeps in memory for backfill.
    pub history_capacity: usize,
    /// Milliseconds a single delivery may take before it is abandoned.
    /// `0` disables the bound.
    pub delivery_timeout_ms: u64,
    /// Optional eviction of sessions that stopped heartbeating.
    pub stale_sweep: StaleSweepSettings,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            backfill_limit: 20,
            history_capacity: 4_096,
            delivery_timeout_ms: 5_000,
            stale_sweep: StaleSweepSettings::default(),
        }
    }
}

/// Stale-session eviction. Off by default: transport disconnects are the
/// authoritative cleanup trigger and heartbeats are bookkeeping only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaleSweepSettings {
    /// Run the sweep.
    pub enabled: bool,
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Sessions idle longer than this are disconnected.
    pub stale_after_secs: u64,
}

impl Default for StaleSweepSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
            stale_after_secs: 300,
        }
    }
}
