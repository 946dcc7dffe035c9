//! A [`Timer`] backed by a deadline queue and an externally driven clock.
//!
//! The driver owns time: it moves the clock forward with
//! [`DeadlineTimer::set_now`], then pops due handles with
//! [`DeadlineTimer::pop_due`] and hands them to the watchdog. The
//! deterministic simulation uses virtual time, the live driver uses elapsed
//! wall-clock time.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::host::{Timer, TimerHandle};

#[derive(Debug, Default)]
pub struct DeadlineTimer {
    now: Duration,
    next_handle: u64,
    pending: BTreeMap<TimerHandle, Duration>,
}

impl DeadlineTimer {
    /// Current clock reading, measured from the driver's epoch.
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Moves the clock. Going backwards is ignored.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Returns the earliest pending expiry and its deadline.
    pub fn next_deadline(&self) -> Option<(TimerHandle, Duration)> {
        self.pending
            .iter()
            .map(|(handle, deadline)| (*handle, *deadline))
            .min_by_key(|(handle, deadline)| (*deadline, *handle))
    }

    /// Removes and returns the earliest expiry that is due.
    pub fn pop_due(&mut self) -> Option<TimerHandle> {
        let (handle, deadline) = self.next_deadline()?;
        if deadline > self.now {
            return None;
        }
        self.pending.remove(&handle);
        Some(handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Timer for DeadlineTimer {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.pending.insert(handle, self.now + delay);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(&handle);
    }
}
