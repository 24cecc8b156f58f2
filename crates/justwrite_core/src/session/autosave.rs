//! Autosave coalescing state machine.
//!
//! Decides when draft writes are issued; performs no I/O itself. The
//! controller feeds it edit, timer, commit and completion events and executes
//! the returned action.
//!
//! # Invariants
//! - At most one write (save or clear) is in flight.
//! - A change observed while a write is in flight yields exactly one trailing
//!   write after it completes.
//! - A pending clear supersedes dirty state recorded before it and is issued
//!   only after the in-flight write completes.
//! - A failed clear is owed until a later write or flush carries it; it is
//!   never retried back to back.

/// Kind of draft store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Save,
    /// `clear()` followed by a save of the then-current draft.
    Clear,
}

/// What the controller must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveAction {
    Nothing,
    /// Start a quiet-period timer tagged with `generation`.
    ArmTimer { generation: u64 },
    Write(WriteKind),
}

#[derive(Debug, Default)]
pub struct AutosaveScheduler {
    debounce: bool,
    dirty: bool,
    clear_pending: bool,
    retry_clear: bool,
    in_flight: Option<WriteKind>,
    armed_timer: Option<u64>,
    next_generation: u64,
}

impl AutosaveScheduler {
    /// `debounce` enables a quiet period before the first write of a burst.
    pub fn new(debounce: bool) -> Self {
        Self {
            debounce,
            ..Self::default()
        }
    }

    /// The draft changed.
    pub fn mark_dirty(&mut self) -> AutosaveAction {
        self.dirty = true;
        if self.in_flight.is_some() || self.armed_timer.is_some() {
            return AutosaveAction::Nothing;
        }
        if self.debounce {
            let generation = self.next_generation;
            self.next_generation += 1;
            self.armed_timer = Some(generation);
            return AutosaveAction::ArmTimer { generation };
        }
        self.next_write()
    }

    /// A quiet-period timer fired. Stale generations are ignored.
    pub fn timer_elapsed(&mut self, generation: u64) -> AutosaveAction {
        if self.armed_timer != Some(generation) {
            return AutosaveAction::Nothing;
        }
        self.armed_timer = None;
        if self.in_flight.is_some() {
            return AutosaveAction::Nothing;
        }
        self.next_write()
    }

    /// A commit succeeded; persisted draft text must be cleared.
    pub fn request_clear(&mut self) -> AutosaveAction {
        self.clear_pending = true;
        self.dirty = false;
        self.armed_timer = None;
        if self.in_flight.is_some() {
            return AutosaveAction::Nothing;
        }
        self.next_write()
    }

    /// The in-flight write failed.
    pub fn write_failed(&mut self) -> AutosaveAction {
        if self.in_flight == Some(WriteKind::Clear) {
            self.retry_clear = true;
        }
        self.write_finished()
    }

    /// The in-flight write completed.
    pub fn write_finished(&mut self) -> AutosaveAction {
        self.in_flight = None;
        if !self.clear_pending && self.armed_timer.is_some() {
            return AutosaveAction::Nothing;
        }
        self.next_write()
    }

    /// Skips any quiet period and writes pending state now.
    pub fn flush(&mut self) -> AutosaveAction {
        self.armed_timer = None;
        if std::mem::take(&mut self.retry_clear) {
            self.clear_pending = true;
        }
        if self.in_flight.is_some() {
            return AutosaveAction::Nothing;
        }
        self.next_write()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && !self.dirty && !self.clear_pending
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> Option<WriteKind> {
        self.in_flight
    }

    fn next_write(&mut self) -> AutosaveAction {
        let kind = if self.clear_pending || (self.retry_clear && self.dirty) {
            WriteKind::Clear
        } else if self.dirty {
            WriteKind::Save
        } else {
            return AutosaveAction::Nothing;
        };
        // A clear re-saves the current draft, so it also covers dirty state.
        self.clear_pending = false;
        self.retry_clear = false;
        self.dirty = false;
        self.in_flight = Some(kind);
        AutosaveAction::Write(kind)
    }
}
