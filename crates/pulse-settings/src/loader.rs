//! Settings loading with deep merge and environment overrides.
//!
//! Loading flow:
//! 1. Serialize [`PulseSettings::default()`] to JSON
//! 2. If the settings file exists, deep-merge it over the defaults
//! 3. Deserialize, then apply `PULSE_*` environment overrides
//! 4. [`PulseSettings::validate`]
//!
//! Deep merge rules:
//! - Objects merge recursively, source winning per key
//! - Arrays and scalars from the source replace the target
//! - `null` in the source leaves the target untouched

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::PulseSettings;

/// Default settings file location (`~/.pulse/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pulse").join("settings.json")
}

/// Load from the default path.
pub fn load_settings() -> Result<PulseSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path`, falling back to defaults when the file is missing.
///
/// Malformed JSON is an error; so is a merged result that fails
/// validation.
pub fn load_settings_from_path(path: &Path) -> Result<PulseSettings> {
    let mut settings = read_layered(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<PulseSettings> {
    let defaults = serde_json::to_value(PulseSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursively merge `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides read through `lookup` (normally `std::env::var`).
///
/// Recognised variables:
///
/// | Variable | Field | Accepted |
/// |---|---|---|
/// | `PULSE_HOST` | `server.host` | non-empty |
/// | `PULSE_PORT` | `server.port` | 0..=65535 |
/// | `PULSE_OUTBOUND_BUFFER` | `server.outboundBuffer` | 1..=65536 |
/// | `PULSE_LOG_LEVEL` | `logging.level` | non-empty |
/// | `PULSE_LOG_JSON` | `logging.json` | bool |
/// | `PULSE_BACKFILL_LIMIT` | `realtime.backfillLimit` | 1..=1000 |
/// | `PULSE_DELIVERY_TIMEOUT_MS` | `realtime.deliveryTimeoutMs` | 0..=600000 |
/// | `PULSE_STALE_SWEEP` | `realtime.staleSweep.enabled` | bool |
/// | `PULSE_INGEST_TOKEN` | `auth.ingestToken` | non-empty |
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_overrides(settings: &mut PulseSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("PULSE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.ranged::<u16>("PULSE_PORT", 0, u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.ranged::<usize>("PULSE_OUTBOUND_BUFFER", 1, 65_536) {
        settings.server.outbound_buffer = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PULSE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PULSE_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Realtime ────────────────────────────────────────────────────
    if let Some(v) = env.ranged::<usize>("PULSE_BACKFILL_LIMIT", 1, 1_000) {
        settings.realtime.backfill_limit = v;
    }
    if let Some(v) = env.ranged::<u64>("PULSE_DELIVERY_TIMEOUT_MS", 0, 600_000) {
        settings.realtime.delivery_timeout_ms = v;
    }
    if let Some(v) = env.bool("PULSE_STALE_SWEEP") {
        settings.realtime.stale_sweep.enabled = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env.string("PULSE_INGEST_TOKEN") {
        settings.auth.ingest_token = Some(v);
    }
}

// ── Pure parsing helpers ────────────────────────────────────────────────────

/// Parse a boolean: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`,
/// case-insensitive.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an integer and accept it only inside `min..=max`.
pub fn parse_ranged<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let parsed = parse_bool(&val);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        parsed
    }

    fn ranged<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = (self.lookup)(name)?;
        let parsed = parse_ranged(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "out-of-range or non-numeric env var, ignoring");
        }
        parsed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
