//! Refresh coalescing
//!
//! At most one refresh runs at a time. Requests arriving while one is
//! running set a single pending slot, so any number of them collapse into
//! exactly one follow-up run.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Slots {
    running: bool,
    pending: bool,
}

#[derive(Debug, Default)]
pub struct RefreshCoalescer {
    slots: Mutex<Slots>,
}

impl RefreshCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a refresh
    ///
    /// Returns `true` when the caller now owns the running guard and must
    /// run the refresh (then call [`finish`](Self::finish)); `false` when a
    /// refresh is already running and this request was folded into the
    /// pending slot.
    pub fn request(&self) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.running {
            slots.pending = true;
            false
        } else {
            slots.running = true;
            true
        }
    }

    /// Report a finished run
    ///
    /// Returns `true` when a request arrived during the run; the caller
    /// keeps the guard and must run once more.
    pub fn finish(&self) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.pending {
            slots.pending = false;
            true
        } else {
            slots.running = false;
            false
        }
    }

    /// Take charge of the run a successful [`request`](Self::request) started
    ///
    /// Dropping the guard before it reports the last run finished (a
    /// panicking refresh) releases the running flag and any pending request.
    pub fn guard(&self) -> RunGuard<'_> {
        RunGuard {
            coalescer: self,
            done: false,
        }
    }

    fn abandon(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.running = false;
        slots.pending = false;
    }

    pub fn is_running(&self) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
    }
}

/// Releases the running flag if a run ends without [`RunGuard::finish`]
pub struct RunGuard<'a> {
    coalescer: &'a RefreshCoalescer,
    done: bool,
}

impl RunGuard<'_> {
    /// Same as [`RefreshCoalescer::finish`]
    pub fn finish(&mut self) -> bool {
        let again = self.coalescer.finish();
        self.done = !again;
        again
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.coalescer.abandon();
        }
    }
}
