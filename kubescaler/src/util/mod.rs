use std::time::Duration;

pub mod colors;
mod error;
pub mod patch;

pub use error::*;

/// Default interval between reconciliation ticks, overridden by `Config::scan_interval_seconds`.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(20);

/// Identifies this process as the field manager for node-label patches and leases.
pub const MANAGER_NAME: &str = "capacity-kubescaler";
