//! Capabilities the watchdog consumes from its embedding host.
//!
//! The watchdog never touches a UI directly. Everything it needs to know about
//! the outside world (which dashboard is open, what the current view is, who
//! is logged in) and everything it does to it (releasing focus, navigating)
//! goes through the traits in this module.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{DashboardId, ViewId};

/// Query-string marker that suppresses the watchdog by default.
pub const DEFAULT_SUPPRESS_MARKER: &str = "disable_timeout";

/// Result of looking up a dashboard's timeout configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigLookup {
    /// The dashboard's configuration container has not loaded yet.
    ContainerNotLoaded,
    /// The container is loaded but has no `view_timeout` section.
    NoTimeoutSection,
    /// The raw, unvalidated `view_timeout` section.
    Section(Value),
}

impl ConfigLookup {
    /// Extracts the `view_timeout` section from a loaded dashboard configuration.
    pub fn from_dashboard_config(config: &Value) -> Self {
        config
            .get("view_timeout")
            .map_or(Self::NoTimeoutSection, |section| {
                Self::Section(section.clone())
            })
    }
}

/// Failures a host may report for best-effort side effects.
///
/// The watchdog logs and swallows these; they never abort a redirect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// No element could take focus.
    #[error("focus release failed: {reason}")]
    Focus { reason: String },

    /// The navigation signal could not be delivered.
    #[error("navigation to {path} failed: {reason}")]
    Navigation { path: String, reason: String },
}

/// Read/act surface of the hosting UI.
pub trait Host {
    /// Returns the identifier of the dashboard currently shown.
    ///
    /// An empty string means no dashboard is active.
    fn active_dashboard_id(&self) -> String;

    /// Looks up the raw timeout configuration of a dashboard.
    fn dashboard_config(&self, dashboard_id: &str) -> ConfigLookup;

    /// Returns the logged-in user's display name, if known.
    fn current_user_name(&self) -> Option<String>;

    /// Returns the trailing segment of the active navigation path.
    fn current_view(&self) -> String;

    /// Returns true when a suppression marker is present.
    fn is_globally_suppressed(&self) -> bool;

    /// Asks the host to drop focus from the active element.
    fn release_focus(&mut self) -> Result<(), HostError>;

    /// Pushes a new navigation path and notifies the host router.
    fn navigate(&mut self, path: &str) -> Result<(), HostError>;
}

/// Opaque handle of a scheduled expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub u64);

/// Schedules one-shot expiries.
///
/// Implementations deliver an expiry by calling
/// [`Watchdog::on_timer`](crate::Watchdog::on_timer) with the returned handle.
pub trait Timer {
    /// Schedules an expiry `delay` from now.
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Cancels a pending expiry. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Kinds of input activity that can reset a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Pointer movement.
    Move,
    /// Pointer click.
    Click,
}

/// Opaque handle of an activity listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Registers interest in activity events.
///
/// Implementations deliver events by calling
/// [`Watchdog::on_activity`](crate::Watchdog::on_activity).
pub trait ActivitySource {
    /// Registers a listener for `kind`.
    fn listen(&mut self, kind: ActivityKind) -> ListenerId;

    /// Removes a registration. Unknown ids are ignored.
    fn unlisten(&mut self, id: ListenerId);
}

/// Derives the view identity from a location: the trailing path segment,
/// without query string or fragment.
pub fn view_identity(location: &str) -> &str {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default()
}

/// Returns true when any marker appears in the location's query string.
pub fn is_suppressed<S: AsRef<str>>(location: &str, markers: &[S]) -> bool {
    let Some((_, query)) = location.split_once('?') else {
        return false;
    };
    let query = query.split('#').next().unwrap_or_default();
    markers
        .iter()
        .map(AsRef::as_ref)
        .any(|marker| !marker.is_empty() && query.contains(marker))
}

/// Builds the navigation path for a view of a dashboard.
pub fn navigation_path(dashboard: &DashboardId, view: &ViewId) -> String {
    format!("/{dashboard}/{view}")
}
