//! Inactivity watchdog for dashboard views.
//!
//! This crate contains:
//! - Settings: validating a dashboard's raw `view_timeout` section
//! - Watchdog: dashboard-change detection, countdown lifecycle and redirects
//! - Host capabilities: the traits an embedding UI implements
//! - Simulation: a deterministic driver over an in-memory host

pub mod activity;
pub mod host;
pub mod memory;
pub mod scheduler;
pub mod settings;
pub mod sim;
pub mod timer;
mod types;
mod watchdog;

pub use host::{ActivityKind, ActivitySource, ConfigLookup, Host, HostError, Timer, TimerHandle};
pub use settings::{Activation, TimeoutSettings, Validated, ViewOverride, validate};
pub use types::{DashboardId, ValidationError, ViewId};
pub use watchdog::{
    DEFAULT_MAX_CONFIG_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS, Watchdog, WatchdogOptions,
};
