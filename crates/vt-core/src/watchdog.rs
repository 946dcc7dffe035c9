//! The inactivity watchdog.
//!
//! A [`Watchdog`] is a sans-IO state machine. Its driver calls:
//!
//! - [`Watchdog::poll`] on a fixed cadence (default: every second)
//! - [`Watchdog::on_timer`] when a handle scheduled on its [`Timer`] expires
//! - [`Watchdog::on_activity`] when input activity is observed
//!
//! All three run to completion and never fail; host failures are logged
//! and swallowed.
//!
//! A dashboard change always wins over the timeout check within one poll:
//! the countdown is torn down first, the new dashboard's configuration is
//! loaded, and countdown logic only resumes on the following poll.

use std::time::Duration;

use serde_json::Value;

use crate::host::{
    ActivityKind, ActivitySource, ConfigLookup, Host, Timer, TimerHandle, navigation_path,
};
use crate::scheduler::{self, Countdown, Decision};
use crate::settings::{self, TimeoutSettings};
use crate::types::DashboardId;

/// Default cadence of [`Watchdog::poll`].
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of polls to wait for a dashboard's configuration to load.
pub const DEFAULT_MAX_CONFIG_ATTEMPTS: u32 = 200;

/// Tuning knobs of the watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogOptions {
    /// How often the driver polls. The watchdog itself only reads this for
    /// reporting; drivers use it to schedule [`Watchdog::poll`].
    pub poll_interval: Duration,

    /// Polls to wait for a dashboard's configuration container before
    /// continuing with an empty configuration.
    pub max_config_attempts: u32,
}

impl Default for WatchdogOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_config_attempts: DEFAULT_MAX_CONFIG_ATTEMPTS,
        }
    }
}

/// What the watchdog knows about the active dashboard.
///
/// `dashboard_id` is only set once the dashboard's configuration has been
/// inspected. `enabled == false` with an id set is a cached "inactive"
/// result that holds until the dashboard changes.
#[derive(Debug, Default)]
struct DashboardContext {
    dashboard_id: Option<DashboardId>,
    settings: Option<TimeoutSettings>,
    enabled: bool,
}

/// A dashboard whose configuration container has not loaded yet.
#[derive(Debug)]
struct PendingLoad {
    dashboard_id: DashboardId,
    attempts: u32,
}

/// Inactivity watchdog over a host, a timer and an activity source.
#[derive(Debug)]
pub struct Watchdog<H, T, A> {
    host: H,
    timer: T,
    activity: A,
    options: WatchdogOptions,
    context: DashboardContext,
    countdown: Countdown,
    pending: Option<PendingLoad>,
}

impl<H, T, A> Watchdog<H, T, A>
where
    H: Host,
    T: Timer,
    A: ActivitySource,
{
    pub fn new(host: H, timer: T, activity: A, options: WatchdogOptions) -> Self {
        Self {
            host,
            timer,
            activity,
            options,
            context: DashboardContext::default(),
            countdown: Countdown::default(),
            pending: None,
        }
    }

    /// Runs one watchdog tick.
    pub fn poll(&mut self) {
        if self.host.is_globally_suppressed() {
            tracing::trace!("watchdog suppressed, skipping tick");
            return;
        }

        let current = DashboardId::new(self.host.active_dashboard_id()).ok();
        if current != self.context.dashboard_id {
            self.handle_dashboard_change(current);
            return;
        }

        if self.context.enabled {
            self.check();
        }
    }

    /// Handles expiry of a timer handle.
    ///
    /// Handles other than the running countdown's are stale and ignored.
    pub fn on_timer(&mut self, handle: TimerHandle) {
        if !self.countdown.owns(handle) {
            tracing::trace!(?handle, "ignoring stale timer");
            return;
        }
        self.execute_redirect();
    }

    /// Handles an input activity signal.
    ///
    /// Restarts the countdown when a listener for `kind` is attached.
    pub fn on_activity(&mut self, kind: ActivityKind) {
        if !self.countdown.listens_for(kind) {
            return;
        }
        let Some(settings) = self.context.settings.as_ref() else {
            return;
        };
        if self.countdown.reset(&mut self.timer, settings.duration()) {
            tracing::trace!(?kind, "activity restarted countdown");
        }
    }

    fn handle_dashboard_change(&mut self, next: Option<DashboardId>) {
        self.stop_countdown();

        let Some(dashboard_id) = next else {
            tracing::info!("no active dashboard");
            self.context = DashboardContext::default();
            self.pending = None;
            return;
        };

        let raw = match self.host.dashboard_config(dashboard_id.as_str()) {
            ConfigLookup::Section(raw) => raw,
            ConfigLookup::NoTimeoutSection => {
                tracing::debug!(dashboard = %dashboard_id, "dashboard has no timeout section");
                self.adopt(dashboard_id, None, false);
                return;
            }
            ConfigLookup::ContainerNotLoaded => {
                let attempts = self.record_attempt(&dashboard_id);
                if attempts < self.options.max_config_attempts {
                    tracing::debug!(
                        dashboard = %dashboard_id,
                        attempts,
                        "dashboard configuration not loaded yet"
                    );
                    return;
                }
                tracing::warn!(
                    dashboard = %dashboard_id,
                    attempts,
                    "dashboard configuration not found, continuing with default configuration"
                );
                Value::Object(serde_json::Map::new())
            }
        };

        let user = self.host.current_user_name();
        let validated = settings::validate(&raw, user.as_deref());
        tracing::info!(
            dashboard = %dashboard_id,
            activation = ?validated.activation,
            duration_ms = validated.settings.duration_ms,
            "dashboard activated"
        );
        let enabled = validated.activation.is_enabled();
        self.adopt(dashboard_id, Some(validated.settings), enabled);
    }

    fn adopt(&mut self, dashboard_id: DashboardId, settings: Option<TimeoutSettings>, enabled: bool) {
        self.pending = None;
        self.context = DashboardContext {
            dashboard_id: Some(dashboard_id),
            settings,
            enabled,
        };
    }

    fn record_attempt(&mut self, dashboard_id: &DashboardId) -> u32 {
        if let Some(pending) = self
            .pending
            .as_mut()
            .filter(|pending| pending.dashboard_id == *dashboard_id)
        {
            pending.attempts = pending.attempts.saturating_add(1);
            return pending.attempts;
        }
        self.pending = Some(PendingLoad {
            dashboard_id: dashboard_id.clone(),
            attempts: 1,
        });
        1
    }

    /// Keeps the countdown running or idle for the current view.
    fn check(&mut self) {
        if !self.dashboard_matches() {
            return;
        }
        let Some(settings) = self.context.settings.as_ref() else {
            self.countdown.stop(&mut self.timer, &mut self.activity);
            return;
        };

        let view = self.host.current_view();
        match scheduler::decide(&view, settings) {
            Decision::Idle(reason) => {
                if self.countdown.stop(&mut self.timer, &mut self.activity) {
                    tracing::debug!(%view, ?reason, "countdown stopped");
                }
            }
            Decision::Run => {
                if self.countdown.start(&mut self.timer, &mut self.activity, settings) {
                    tracing::debug!(%view, duration_ms = settings.duration_ms, "countdown started");
                }
            }
        }
    }

    fn execute_redirect(&mut self) {
        self.stop_countdown();

        if !self.dashboard_matches() {
            tracing::debug!("dashboard changed before timeout, not redirecting");
            return;
        }
        if self.host.is_globally_suppressed() {
            tracing::debug!("watchdog suppressed, not redirecting");
            return;
        }

        let (Some(dashboard_id), Some(settings)) =
            (self.context.dashboard_id.as_ref(), self.context.settings.as_ref())
        else {
            return;
        };
        let view = self.host.current_view();
        // The view may have changed since the last tick.
        if let Decision::Idle(reason) = scheduler::decide(&view, settings) {
            tracing::debug!(%view, ?reason, "view no longer counts down, not redirecting");
            return;
        }
        let Some(target) = scheduler::resolve_target(&view, settings) else {
            tracing::debug!(%view, "no redirect target");
            return;
        };

        let path = navigation_path(dashboard_id, target);
        if let Err(err) = self.host.release_focus() {
            tracing::warn!(error = %err, "failed to release focus");
        }
        tracing::info!(%path, from = %view, "idle timeout elapsed, redirecting");
        if let Err(err) = self.host.navigate(&path) {
            tracing::warn!(error = %err, "navigation failed");
        }
    }

    fn stop_countdown(&mut self) {
        if self.countdown.stop(&mut self.timer, &mut self.activity) {
            tracing::debug!("countdown stopped");
        }
    }

    fn dashboard_matches(&self) -> bool {
        self.context
            .dashboard_id
            .as_ref()
            .is_some_and(|id| *id == *self.host.active_dashboard_id())
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub const fn timer(&self) -> &T {
        &self.timer
    }

    pub const fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub const fn activity(&self) -> &A {
        &self.activity
    }

    pub const fn options(&self) -> &WatchdogOptions {
        &self.options
    }

    /// Returns the dashboard whose configuration is currently loaded.
    pub const fn dashboard_id(&self) -> Option<&DashboardId> {
        self.context.dashboard_id.as_ref()
    }

    /// Returns the settings of the current dashboard.
    pub const fn settings(&self) -> Option<&TimeoutSettings> {
        self.context.settings.as_ref()
    }

    pub const fn is_enabled(&self) -> bool {
        self.context.enabled
    }

    pub const fn is_counting_down(&self) -> bool {
        self.countdown.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::memory::{ListenerTable, MemoryHost};
    use crate::timer::DeadlineTimer;

    type TestWatchdog = Watchdog<MemoryHost, DeadlineTimer, ListenerTable>;

    fn watchdog(host: MemoryHost) -> TestWatchdog {
        Watchdog::new(
            host,
            DeadlineTimer::default(),
            ListenerTable::default(),
            WatchdogOptions::default(),
        )
    }

    fn timed_dashboard(section: Value) -> Value {
        json!({"title": "Test", "view_timeout": section})
    }

    #[test]
    fn first_poll_only_loads_configuration() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);

        wd.poll();
        assert_eq!(wd.dashboard_id().map(DashboardId::as_str), Some("mydash"));
        assert!(wd.is_enabled());
        assert!(!wd.is_counting_down());

        wd.poll();
        assert!(wd.is_counting_down());
    }

    #[test]
    fn missing_section_caches_inactive_result() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", json!({"title": "Plain"}));
        let mut wd = watchdog(host);

        wd.poll();
        wd.poll();

        assert_eq!(wd.dashboard_id().map(DashboardId::as_str), Some("mydash"));
        assert!(!wd.is_enabled());
        assert!(wd.settings().is_none());
        assert!(!wd.is_counting_down());
    }

    #[test]
    fn unloaded_container_is_retried() {
        let host = MemoryHost::new("mydash", "/mydash/settings").with_loading_dashboard("mydash");
        let mut wd = watchdog(host);

        wd.poll();
        assert!(wd.dashboard_id().is_none());

        wd.host_mut()
            .dashboards
            .insert("mydash".to_string(), Some(timed_dashboard(json!({"timeout": true}))));
        wd.poll();
        assert!(wd.is_enabled());
    }

    #[test]
    fn unloaded_container_gives_up_after_attempt_limit() {
        let host = MemoryHost::new("mydash", "/mydash/settings").with_loading_dashboard("mydash");
        let mut wd = Watchdog::new(
            host,
            DeadlineTimer::default(),
            ListenerTable::default(),
            WatchdogOptions {
                max_config_attempts: 3,
                ..WatchdogOptions::default()
            },
        );

        wd.poll();
        wd.poll();
        assert!(wd.dashboard_id().is_none());

        wd.poll();
        assert_eq!(wd.dashboard_id().map(DashboardId::as_str), Some("mydash"));
        assert!(!wd.is_enabled());
        assert_eq!(wd.settings(), Some(&TimeoutSettings::default()));
    }

    #[test]
    fn attempt_counter_restarts_for_new_dashboard() {
        let host = MemoryHost::new("a", "/a/x")
            .with_loading_dashboard("a")
            .with_loading_dashboard("b");
        let mut wd = Watchdog::new(
            host,
            DeadlineTimer::default(),
            ListenerTable::default(),
            WatchdogOptions {
                max_config_attempts: 2,
                ..WatchdogOptions::default()
            },
        );

        wd.poll();
        wd.host_mut().dashboard = "b".to_string();
        wd.poll();
        assert!(wd.dashboard_id().is_none());

        wd.poll();
        assert_eq!(wd.dashboard_id().map(DashboardId::as_str), Some("b"));
    }

    #[test]
    fn unauthorized_user_never_counts_down() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_user("mallory")
            .with_dashboard(
                "mydash",
                timed_dashboard(json!({"timeout": true, "users": ["alice"]})),
            );
        let mut wd = watchdog(host);

        for _ in 0..10 {
            wd.poll();
        }

        assert!(!wd.is_enabled());
        assert!(!wd.is_counting_down());
        assert_eq!(wd.timer().pending_count(), 0);
    }

    #[test]
    fn home_view_stops_countdown_within_one_tick() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();
        assert!(wd.is_counting_down());

        wd.host_mut().location = "/mydash/home".to_string();
        wd.poll();

        assert!(!wd.is_counting_down());
        assert_eq!(wd.timer().pending_count(), 0);
        assert_eq!(wd.activity().live_count(), 0);
    }

    #[test]
    fn expiry_navigates_to_home() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        let (handle, _) = wd.timer().next_deadline().unwrap();
        wd.on_timer(handle);

        assert_eq!(wd.host().navigations, vec!["/mydash/home"]);
        assert_eq!(wd.host().focus_releases, 1);
        assert!(!wd.is_counting_down());
        assert_eq!(wd.activity().live_count(), 0);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        let (stale, _) = wd.timer().next_deadline().unwrap();
        wd.on_activity(ActivityKind::Click);
        wd.on_timer(stale);

        assert!(wd.host().navigations.is_empty());
        assert!(wd.is_counting_down());
    }

    #[test]
    fn unregistered_activity_does_not_reset() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        let (before, _) = wd.timer().next_deadline().unwrap();
        wd.on_activity(ActivityKind::Move);
        let (after, _) = wd.timer().next_deadline().unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn host_failures_do_not_block_redirect() {
        let mut host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        host.fail_focus = true;
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        let (handle, _) = wd.timer().next_deadline().unwrap();
        wd.on_timer(handle);

        assert_eq!(wd.host().navigations, vec!["/mydash/home"]);
    }

    #[test]
    fn navigation_failure_is_swallowed() {
        let mut host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        host.fail_navigation = true;
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        let (handle, _) = wd.timer().next_deadline().unwrap();
        wd.on_timer(handle);

        assert!(wd.host().navigations.is_empty());
        assert!(!wd.is_counting_down());

        // The view did not change, so the next tick counts down again.
        wd.poll();
        assert!(wd.is_counting_down());
    }

    #[test]
    fn dashboard_change_cancels_pending_countdown() {
        let host = MemoryHost::new("a", "/a/settings")
            .with_dashboard("a", timed_dashboard(json!({"timeout": true})))
            .with_dashboard("b", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();
        let (old, _) = wd.timer().next_deadline().unwrap();

        wd.host_mut().dashboard = "b".to_string();
        wd.host_mut().location = "/b/settings".to_string();
        wd.poll();

        assert!(!wd.is_counting_down());
        assert_eq!(wd.timer().pending_count(), 0);
        wd.on_timer(old);
        assert!(wd.host().navigations.is_empty());
    }

    #[test]
    fn expiry_after_unnoticed_dashboard_change_is_aborted() {
        let host = MemoryHost::new("a", "/a/settings")
            .with_dashboard("a", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();
        let (handle, _) = wd.timer().next_deadline().unwrap();

        wd.host_mut().dashboard = "b".to_string();
        wd.on_timer(handle);

        assert!(wd.host().navigations.is_empty());
        assert!(!wd.is_counting_down());
    }

    #[test]
    fn leaving_all_dashboards_clears_context() {
        let host = MemoryHost::new("a", "/a/settings")
            .with_dashboard("a", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        wd.host_mut().dashboard = String::new();
        wd.poll();

        assert!(wd.dashboard_id().is_none());
        assert!(!wd.is_enabled());
        assert!(!wd.is_counting_down());
    }

    #[test]
    fn suppressed_tick_has_no_side_effects() {
        let host = MemoryHost::new("mydash", "/mydash/settings?disable_timeout")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);

        wd.poll();
        wd.poll();

        assert!(wd.dashboard_id().is_none());
        assert!(!wd.is_counting_down());
    }

    #[test]
    fn suppression_keeps_countdown_but_blocks_redirect() {
        let host = MemoryHost::new("mydash", "/mydash/settings")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();

        wd.host_mut().location = "/mydash/settings?disable_timeout".to_string();
        wd.poll();
        assert!(wd.is_counting_down());

        let (handle, _) = wd.timer().next_deadline().unwrap();
        wd.on_timer(handle);

        assert!(wd.host().navigations.is_empty());
        assert!(!wd.is_counting_down());
    }

    #[test]
    fn expiry_on_view_that_became_disabled_does_not_redirect() {
        let host = MemoryHost::new("mydash", "/mydash/kitchen").with_dashboard(
            "mydash",
            timed_dashboard(json!({"timeout": true, "views": {"settings": false}})),
        );
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();
        let (handle, _) = wd.timer().next_deadline().unwrap();

        wd.host_mut().location = "/mydash/settings".to_string();
        wd.on_timer(handle);

        assert!(wd.host().navigations.is_empty());
        assert_eq!(wd.host().focus_releases, 0);
    }

    #[test]
    fn expiry_on_home_view_keeps_focus() {
        let host = MemoryHost::new("mydash", "/mydash/kitchen")
            .with_dashboard("mydash", timed_dashboard(json!({"timeout": true})));
        let mut wd = watchdog(host);
        wd.poll();
        wd.poll();
        let (handle, _) = wd.timer().next_deadline().unwrap();

        wd.host_mut().location = "/mydash/home".to_string();
        wd.on_timer(handle);

        assert!(wd.host().navigations.is_empty());
        assert_eq!(wd.host().focus_releases, 0);
    }
}
