//! Deterministic simulation of a watchdog in virtual time.
//!
//! The simulation owns the clock. Polls happen every
//! [`WatchdogOptions::poll_interval`] starting at zero; expiries fire at their
//! deadlines. When a poll and an expiry are due at the same instant, the
//! expiry runs first.

use std::time::Duration;

use crate::host::{ActivityKind, Host};
use crate::memory::{ListenerTable, MemoryHost};
use crate::timer::DeadlineTimer;
use crate::watchdog::{Watchdog, WatchdogOptions};

/// A navigation issued during a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Virtual time of the navigation.
    pub at: Duration,
    /// Path passed to the host.
    pub path: String,
}

#[derive(Debug, Clone, Copy)]
enum Due {
    Poll,
    Expiry,
}

/// A watchdog over an in-memory host, driven in virtual time.
#[derive(Debug)]
pub struct Simulation {
    watchdog: Watchdog<MemoryHost, DeadlineTimer, ListenerTable>,
    next_poll: Duration,
    navigations: Vec<Navigation>,
}

impl Simulation {
    /// Creates a simulation at time zero. The poll interval is at least one
    /// millisecond.
    pub fn new(host: MemoryHost, options: WatchdogOptions) -> Self {
        let options = WatchdogOptions {
            poll_interval: options.poll_interval.max(Duration::from_millis(1)),
            ..options
        };
        Self {
            watchdog: Watchdog::new(host, DeadlineTimer::default(), ListenerTable::default(), options),
            next_poll: Duration::ZERO,
            navigations: Vec::new(),
        }
    }

    /// Current virtual time.
    pub const fn now(&self) -> Duration {
        self.watchdog.timer().now()
    }

    /// Runs every poll and expiry due up to and including `target`.
    pub fn advance_to(&mut self, target: Duration) {
        loop {
            let (at, due) = self.next_event();
            if at > target {
                break;
            }
            self.watchdog.timer_mut().set_now(at);
            match due {
                Due::Expiry => {
                    if let Some(handle) = self.watchdog.timer_mut().pop_due() {
                        self.watchdog.on_timer(handle);
                    }
                }
                Due::Poll => {
                    self.watchdog.poll();
                    self.next_poll += self.watchdog.options().poll_interval;
                }
            }
            self.record_navigations();
        }
        self.watchdog.timer_mut().set_now(target);
    }

    /// Advances virtual time by `delta`.
    pub fn advance(&mut self, delta: Duration) {
        let target = self.now() + delta;
        self.advance_to(target);
    }

    /// Delivers an activity event at the current time.
    ///
    /// Events of a kind nobody listens for are dropped, as a real event
    /// source would.
    pub fn activity(&mut self, kind: ActivityKind) {
        if self.watchdog.activity().is_listening(kind) {
            self.watchdog.on_activity(kind);
        }
    }

    /// Current view of the simulated host.
    pub fn current_view(&self) -> String {
        self.watchdog.host().current_view()
    }

    /// Navigations issued by the watchdog so far.
    pub fn navigations(&self) -> &[Navigation] {
        &self.navigations
    }

    pub const fn watchdog(&self) -> &Watchdog<MemoryHost, DeadlineTimer, ListenerTable> {
        &self.watchdog
    }

    pub const fn host(&self) -> &MemoryHost {
        self.watchdog.host()
    }

    /// Mutable access to the host, e.g. to simulate the user navigating.
    pub const fn host_mut(&mut self) -> &mut MemoryHost {
        self.watchdog.host_mut()
    }

    fn next_event(&self) -> (Duration, Due) {
        match self.watchdog.timer().next_deadline() {
            Some((_, deadline)) if deadline <= self.next_poll => (deadline, Due::Expiry),
            _ => (self.next_poll, Due::Poll),
        }
    }

    fn record_navigations(&mut self) {
        let at = self.now();
        let issued = &self.watchdog.host().navigations;
        for path in issued.iter().skip(self.navigations.len()) {
            self.navigations.push(Navigation {
                at,
                path: path.clone(),
            });
        }
    }
}
