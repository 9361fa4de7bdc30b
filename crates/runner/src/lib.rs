//! GeoTrackr Runner
//!
//! Host pieces around the sync client:
//!
//! - **Config**: defaults, JSON file and `GEOTRACKR_*` environment overrides
//! - **REST snapshot**: the polled asset list behind `{api}/assets`
//! - **Notifier**: notifications written to the log
//!
//! The `geotrackr-watch` binary wires them to a [`SyncClient`] over SockJS.

pub mod config;
pub mod notifier;
pub mod rest;

pub use config::{ConfigError, RunnerConfig, load_config, load_config_from_str};
pub use notifier::LoggingNotifier;
pub use rest::{RestError, RestSnapshotSource};

pub use geotrackr_sync::SyncClient;
