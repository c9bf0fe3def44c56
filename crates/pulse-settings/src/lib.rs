//! # pulse-settings
//!
//! Configuration for the Pulse gateway.
//!
//! Settings are resolved in three layers, later layers winning:
//!
//! 1. Compiled defaults ([`PulseSettings::default()`])
//! 2. A JSON file (`~/.pulse/settings.json` unless a path is given),
//!    deep-merged over the defaults so a file only needs the keys it changes
//! 3. `PULSE_*` environment variables
//!
//! The result is a plain value. Callers pass it by reference; there is no
//! process-wide settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{
    AccessSettings, AuthSettings, LoggingSettings, PulseSettings, RealtimeSettings,
    ServerSettings, StaleSweepSettings,
};
