//! Activity listener lifecycle.

use crate::host::{ActivityKind, ActivitySource, ListenerId};
use crate::settings::TimeoutSettings;

/// Tracks which activity listeners are registered for the running countdown.
///
/// Attaching is guarded by a flag rather than by the registration list: a
/// configuration with both reset kinds turned off is still "attached" while a
/// countdown runs, it just holds no registrations.
#[derive(Debug, Default)]
pub struct ActivityGate {
    registrations: Vec<(ActivityKind, ListenerId)>,
    attached: bool,
}

impl ActivityGate {
    /// Registers the listeners `settings` asks for. No-op when already attached.
    pub fn attach<A: ActivitySource>(&mut self, source: &mut A, settings: &TimeoutSettings) {
        if self.attached {
            return;
        }
        let kinds = [
            (ActivityKind::Move, settings.reset_on_move),
            (ActivityKind::Click, settings.reset_on_click),
        ];
        for (kind, wanted) in kinds {
            if wanted {
                let id = source.listen(kind);
                self.registrations.push((kind, id));
            }
        }
        self.attached = true;
        tracing::trace!(registrations = self.registrations.len(), "activity listeners attached");
    }

    /// Removes every registration. Safe to call when nothing is attached.
    pub fn detach<A: ActivitySource>(&mut self, source: &mut A) {
        for (_, id) in self.registrations.drain(..) {
            source.unlisten(id);
        }
        if self.attached {
            tracing::trace!("activity listeners detached");
        }
        self.attached = false;
    }

    pub const fn is_attached(&self) -> bool {
        self.attached
    }

    /// Returns true when a registration for `kind` is live.
    pub fn listens_for(&self, kind: ActivityKind) -> bool {
        self.registrations.iter().any(|(k, _)| *k == kind)
    }
}
