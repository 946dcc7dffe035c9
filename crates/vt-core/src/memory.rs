//! In-memory implementations of the host capabilities.
//!
//! Used by the simulation harness and by the file-backed live driver, whose
//! state file is a serialized [`MemoryHost`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::{
    ActivityKind, ActivitySource, ConfigLookup, DEFAULT_SUPPRESS_MARKER, Host, HostError,
    ListenerId, is_suppressed, view_identity,
};

/// A host whose state is plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryHost {
    /// Active dashboard id. Empty when no dashboard is open.
    pub dashboard: String,

    /// Current location, e.g. `/mydash/settings?kiosk`.
    pub location: String,

    /// Logged-in user's display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Full dashboard configurations by id. `null` means still loading.
    pub dashboards: BTreeMap<String, Option<Value>>,

    /// Query-string markers that suppress the watchdog.
    #[serde(skip, default = "default_markers")]
    pub suppress_markers: Vec<String>,

    /// Every path passed to [`Host::navigate`], in order.
    #[serde(skip)]
    pub navigations: Vec<String>,

    /// Number of successful focus releases.
    #[serde(skip)]
    pub focus_releases: usize,

    /// Makes [`Host::release_focus`] fail.
    #[serde(skip)]
    pub fail_focus: bool,

    /// Makes [`Host::navigate`] fail.
    #[serde(skip)]
    pub fail_navigation: bool,
}

fn default_markers() -> Vec<String> {
    vec![DEFAULT_SUPPRESS_MARKER.to_string()]
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            dashboard: String::new(),
            location: String::new(),
            user: None,
            dashboards: BTreeMap::new(),
            suppress_markers: default_markers(),
            navigations: Vec::new(),
            focus_releases: 0,
            fail_focus: false,
            fail_navigation: false,
        }
    }
}

impl MemoryHost {
    /// Creates a host showing `location` on `dashboard`.
    pub fn new(dashboard: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            dashboard: dashboard.into(),
            location: location.into(),
            ..Self::default()
        }
    }

    /// Sets the logged-in user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Registers a loaded dashboard configuration.
    #[must_use]
    pub fn with_dashboard(mut self, id: impl Into<String>, config: Value) -> Self {
        self.dashboards.insert(id.into(), Some(config));
        self
    }

    /// Registers a dashboard whose configuration has not loaded yet.
    #[must_use]
    pub fn with_loading_dashboard(mut self, id: impl Into<String>) -> Self {
        self.dashboards.insert(id.into(), None);
        self
    }

    /// Copies the externally owned state from `other`, keeping the
    /// recorded side effects and failure switches of `self`.
    pub fn sync_from(&mut self, other: Self) {
        self.dashboard = other.dashboard;
        self.location = other.location;
        self.user = other.user;
        self.dashboards = other.dashboards;
    }
}

impl Host for MemoryHost {
    fn active_dashboard_id(&self) -> String {
        self.dashboard.clone()
    }

    fn dashboard_config(&self, dashboard_id: &str) -> ConfigLookup {
        match self.dashboards.get(dashboard_id) {
            Some(Some(config)) => ConfigLookup::from_dashboard_config(config),
            Some(None) | None => ConfigLookup::ContainerNotLoaded,
        }
    }

    fn current_user_name(&self) -> Option<String> {
        self.user.clone()
    }

    fn current_view(&self) -> String {
        view_identity(&self.location).to_string()
    }

    fn is_globally_suppressed(&self) -> bool {
        is_suppressed(&self.location, &self.suppress_markers)
    }

    fn release_focus(&mut self) -> Result<(), HostError> {
        if self.fail_focus {
            return Err(HostError::Focus {
                reason: "no focusable element".to_string(),
            });
        }
        self.focus_releases += 1;
        Ok(())
    }

    fn navigate(&mut self, path: &str) -> Result<(), HostError> {
        if self.fail_navigation {
            return Err(HostError::Navigation {
                path: path.to_string(),
                reason: "router unavailable".to_string(),
            });
        }
        self.navigations.push(path.to_string());
        self.location = path.to_string();
        Ok(())
    }
}

/// An [`ActivitySource`] that only keeps a table of live registrations.
#[derive(Debug, Default)]
pub struct ListenerTable {
    next_id: u64,
    live: BTreeMap<ListenerId, ActivityKind>,
    listen_calls: usize,
    unlisten_calls: usize,
}

impl ListenerTable {
    /// Returns true when at least one listener for `kind` is registered.
    pub fn is_listening(&self, kind: ActivityKind) -> bool {
        self.live.values().any(|k| *k == kind)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub const fn listen_calls(&self) -> usize {
        self.listen_calls
    }

    pub const fn unlisten_calls(&self) -> usize {
        self.unlisten_calls
    }
}

impl ActivitySource for ListenerTable {
    fn listen(&mut self, kind: ActivityKind) -> ListenerId {
        self.next_id += 1;
        self.listen_calls += 1;
        let id = ListenerId(self.next_id);
        self.live.insert(id, kind);
        id
    }

    fn unlisten(&mut self, id: ListenerId) {
        self.unlisten_calls += 1;
        self.live.remove(&id);
    }
}
