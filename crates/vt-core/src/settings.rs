//! Timeout settings and the validator that builds them from raw configuration.
//!
//! Dashboard configuration is authored by hand and arrives untyped, so
//! validation never fails: a malformed field falls back to its default and
//! the rest of the section is still honored.

use std::collections::{BTreeMap, BTreeSet};
use std::num::FpCategory;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::ViewId;

/// Countdown length used when `duration` is missing or invalid.
pub const DEFAULT_DURATION_MS: u64 = 15_000;

/// Home view used when `default` is missing or invalid.
pub const DEFAULT_HOME_VIEW: &str = "home";

/// Per-view exception to the default redirect target.
///
/// A view absent from [`TimeoutSettings::view_overrides`] has no override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum ViewOverride {
    /// Never redirect away from this view.
    Disabled,
    /// Redirect to this view instead of the home view.
    Redirect(ViewId),
}

/// Validated timeout configuration of one dashboard.
///
/// Built once per dashboard activation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeoutSettings {
    /// Idle time before redirecting, in milliseconds. Always positive.
    pub duration_ms: u64,

    /// Idle-return destination. `None` when explicitly cleared.
    pub home_view: Option<ViewId>,

    /// Lowercased user names the timeout applies to.
    pub allowed_users: BTreeSet<String>,

    /// Whether a non-empty `users` list was configured. Stays set when none
    /// of its entries were usable, so such a list excludes everyone.
    pub users_restricted: bool,

    /// Whether pointer movement restarts the countdown.
    pub reset_on_move: bool,

    /// Whether clicks restart the countdown.
    pub reset_on_click: bool,

    /// Per-view overrides of the redirect target.
    pub view_overrides: BTreeMap<ViewId, ViewOverride>,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_MS,
            home_view: ViewId::new(DEFAULT_HOME_VIEW).ok(),
            allowed_users: BTreeSet::new(),
            users_restricted: false,
            reset_on_move: false,
            reset_on_click: true,
            view_overrides: BTreeMap::new(),
        }
    }
}

impl TimeoutSettings {
    /// Returns the countdown length.
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Returns the override configured for `view`, if any.
    pub fn override_for(&self, view: &str) -> Option<&ViewOverride> {
        let view = ViewId::new(view).ok()?;
        self.view_overrides.get(&view)
    }

    /// Returns true when the timeout applies to `user`.
    ///
    /// An unknown or empty user name never matches an allow-list.
    pub fn allows_user(&self, user: Option<&str>) -> bool {
        if !self.users_restricted {
            return true;
        }
        let Some(user) = user.map(str::to_lowercase).filter(|u| !u.is_empty()) else {
            return false;
        };
        self.allowed_users.contains(&user)
    }
}

/// Whether a validated configuration turns the watchdog on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// The countdown runs for this dashboard.
    Enabled,
    /// `timeout` is missing or falsy.
    TimeoutOff,
    /// An allow-list is configured and the current user is not on it.
    UserNotAllowed,
}

impl Activation {
    /// Returns true for [`Activation::Enabled`].
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Output of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validated {
    pub settings: TimeoutSettings,
    pub activation: Activation,
}

/// Validates a raw `view_timeout` section for the given user.
///
/// A missing user name is excluded by any allow-list.
pub fn validate(raw: &Value, user: Option<&str>) -> Validated {
    let empty = Map::new();
    let section = raw.as_object().unwrap_or(&empty);
    let defaults = TimeoutSettings::default();

    let reset = section.get("reset").and_then(Value::as_object);
    let (users_restricted, allowed_users) = section
        .get("users")
        .map(parse_users)
        .unwrap_or_default();
    let settings = TimeoutSettings {
        duration_ms: section
            .get("duration")
            .and_then(parse_duration_ms)
            .unwrap_or(defaults.duration_ms),
        home_view: parse_home_view(section.get("default")),
        allowed_users,
        users_restricted,
        reset_on_move: reset
            .and_then(|r| r.get("mouse_move"))
            .and_then(Value::as_bool)
            .unwrap_or(defaults.reset_on_move),
        reset_on_click: reset
            .and_then(|r| r.get("mouse_click"))
            .and_then(Value::as_bool)
            .unwrap_or(defaults.reset_on_click),
        view_overrides: section
            .get("views")
            .and_then(Value::as_object)
            .map(parse_overrides)
            .unwrap_or_default(),
    };

    let activation = if !is_truthy(section.get("timeout")) {
        Activation::TimeoutOff
    } else if !settings.allows_user(user) {
        Activation::UserNotAllowed
    } else {
        Activation::Enabled
    };

    tracing::debug!(?activation, ?settings, "validated timeout settings");
    Validated {
        settings,
        activation,
    }
}

/// Loose truthiness, matching how dashboard authors write `timeout: 1` or
/// `timeout: "yes"`.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n
            .as_f64()
            .is_some_and(|f| !matches!(f.classify(), FpCategory::Zero | FpCategory::Nan)),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is checked to be finite and positive before the cast"
)]
fn parse_duration_ms(value: &Value) -> Option<u64> {
    if let Some(ms) = value.as_u64() {
        return (ms > 0).then_some(ms);
    }
    let ms = value.as_f64()?;
    // Sub-millisecond values clamp to 1 ms.
    (ms.is_finite() && ms > 0.0).then(|| ms.round().max(1.0) as u64)
}

fn parse_home_view(value: Option<&Value>) -> Option<ViewId> {
    match value {
        // Explicitly cleared: only per-view redirects apply.
        Some(Value::Null | Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => ViewId::new(s.as_str()).ok(),
        Some(other) => {
            tracing::debug!(value = %other, "ignoring malformed default view");
            ViewId::new(DEFAULT_HOME_VIEW).ok()
        }
        None => ViewId::new(DEFAULT_HOME_VIEW).ok(),
    }
}

/// Returns whether the value restricts users, and the usable names.
fn parse_users(value: &Value) -> (bool, BTreeSet<String>) {
    let (restricted, names): (bool, Vec<&str>) = match value {
        Value::String(user) => (!user.is_empty(), vec![user.as_str()]),
        Value::Array(users) => (
            !users.is_empty(),
            users.iter().filter_map(Value::as_str).collect(),
        ),
        _ => (false, Vec::new()),
    };
    let allowed: BTreeSet<String> = names
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect();
    if restricted && allowed.is_empty() {
        tracing::warn!(users = %value, "allow-list has no usable names, timeout applies to nobody");
    }
    (restricted, allowed)
}

fn parse_overrides(views: &Map<String, Value>) -> BTreeMap<ViewId, ViewOverride> {
    views
        .iter()
        .filter_map(|(view, value)| {
            let view = ViewId::new(view.as_str()).ok()?;
            let entry = match value {
                Value::Bool(false) => ViewOverride::Disabled,
                Value::String(target) => ViewOverride::Redirect(ViewId::new(target.as_str()).ok()?),
                _ => {
                    tracing::debug!(%view, %value, "ignoring malformed view override");
                    return None;
                }
            };
            Some((view, entry))
        })
        .collect()
}
