//! Countdown ownership and the per-view redirect policy.
//!
//! # Policy
//!
//! For the current view, in order:
//!
//! 1. the home view never counts down
//! 2. a `Disabled` override never counts down
//! 3. without a home view, only views with a redirect override count down
//! 4. every other view counts down
//!
//! On expiry the redirect goes to the view's override target, falling back
//! to the home view.

use std::time::Duration;

use crate::activity::ActivityGate;
use crate::host::{ActivityKind, ActivitySource, Timer, TimerHandle};
use crate::settings::{TimeoutSettings, ViewOverride};
use crate::types::ViewId;

/// Why a view does not count down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    /// The view is the home view.
    HomeView,
    /// The view has a `Disabled` override.
    Disabled,
    /// There is no home view and no override for this view.
    NoTarget,
}

/// Whether a countdown should run on a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Run,
    Idle(IdleReason),
}

/// Applies the redirect policy to `view`.
pub fn decide(view: &str, settings: &TimeoutSettings) -> Decision {
    if settings.home_view.as_ref().is_some_and(|home| home == view) {
        return Decision::Idle(IdleReason::HomeView);
    }
    match settings.override_for(view) {
        Some(ViewOverride::Disabled) => Decision::Idle(IdleReason::Disabled),
        None if settings.home_view.is_none() => Decision::Idle(IdleReason::NoTarget),
        _ => Decision::Run,
    }
}

/// Resolves where an expired countdown on `view` redirects to.
pub fn resolve_target<'a>(view: &str, settings: &'a TimeoutSettings) -> Option<&'a ViewId> {
    match settings.override_for(view) {
        Some(ViewOverride::Redirect(target)) => Some(target),
        Some(ViewOverride::Disabled) => None,
        None => settings.home_view.as_ref(),
    }
}

/// The single countdown: a pending expiry plus its activity listeners.
///
/// Invariant: listeners are attached exactly when a timer is pending.
#[derive(Debug, Default)]
pub struct Countdown {
    timer: Option<TimerHandle>,
    gate: ActivityGate,
}

impl Countdown {
    pub const fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Returns true when `handle` is the pending expiry.
    pub fn owns(&self, handle: TimerHandle) -> bool {
        self.timer == Some(handle)
    }

    /// Returns true when activity of `kind` resets this countdown.
    pub fn listens_for(&self, kind: ActivityKind) -> bool {
        self.is_running() && self.gate.listens_for(kind)
    }

    /// Starts the countdown unless one is already running.
    ///
    /// Returns true when a new countdown was started.
    pub fn start<T, A>(&mut self, timer: &mut T, source: &mut A, settings: &TimeoutSettings) -> bool
    where
        T: Timer,
        A: ActivitySource,
    {
        if self.is_running() {
            return false;
        }
        self.gate.attach(source, settings);
        self.timer = Some(timer.schedule(settings.duration()));
        true
    }

    /// Replaces the pending expiry with a fresh one `duration` from now.
    ///
    /// Listener registrations are left alone. Returns false when no
    /// countdown is running.
    pub fn reset<T: Timer>(&mut self, timer: &mut T, duration: Duration) -> bool {
        let Some(handle) = self.timer.take() else {
            return false;
        };
        timer.cancel(handle);
        self.timer = Some(timer.schedule(duration));
        true
    }

    /// Detaches listeners and cancels the pending expiry.
    ///
    /// Returns true when a countdown was actually stopped.
    pub fn stop<T, A>(&mut self, timer: &mut T, source: &mut A) -> bool
    where
        T: Timer,
        A: ActivitySource,
    {
        self.gate.detach(source);
        let Some(handle) = self.timer.take() else {
            return false;
        };
        timer.cancel(handle);
        true
    }
}
