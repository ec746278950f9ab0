//! Signals between the UI thread and the loader worker.
//!
//! The worker wraps each entry step in a [`StepGuard`]; the UI wraps every
//! listing mutation in a [`MutationGuard`]. A mutation waits until the worker
//! is between steps, and no step starts while a mutation is open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::scale::TileBox;

#[derive(Default)]
struct State {
    mutating: bool,
    busy: bool,
}

#[derive(Default)]
pub struct WorkerControl {
    stop: AtomicBool,
    state: Mutex<State>,
    cond: Condvar,
    rescale: Mutex<Option<TileBox>>,
}

impl WorkerControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rescale_slot(&self) -> MutexGuard<'_, Option<TileBox>> {
        self.rescale.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Stop ────────────────────────────────────────────────────────────

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        // Wake a sleeping worker; take the lock so the notify cannot slip
        // between its check and its wait.
        let _state = self.state();
        self.cond.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    // ── Steps and mutations ─────────────────────────────────────────────

    /// Enter a busy window, unless stopping or a mutation is open.
    pub fn try_step(&self) -> Option<StepGuard<'_>> {
        let mut state = self.state();
        if state.mutating || self.stop_requested() {
            return None;
        }
        state.busy = true;
        Some(StepGuard { control: self })
    }

    /// Open a listing mutation. Blocks until the worker leaves its busy
    /// window; the worker starts no new step until the guard drops.
    pub fn begin_mutation(&self) -> MutationGuard<'_> {
        let mut state = self.state();
        state.mutating = true;
        while state.busy {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        MutationGuard { control: self }
    }

    pub fn is_mutating(&self) -> bool {
        self.state().mutating
    }

    pub fn is_busy(&self) -> bool {
        self.state().busy
    }

    /// Sleep up to `interval`; returns early on stop.
    pub fn sleep(&self, interval: Duration) {
        let state = self.state();
        if self.stop_requested() {
            return;
        }
        let _ = self
            .cond
            .wait_timeout_while(state, interval, |_| !self.stop_requested())
            .unwrap_or_else(PoisonError::into_inner);
    }

    // ── Rescale requests ────────────────────────────────────────────────

    /// Ask for a rescale on the next pass. A newer request replaces an
    /// older one that has not been picked up yet.
    pub fn request_rescale(&self, tile_box: TileBox) {
        *self.rescale_slot() = Some(tile_box);
    }

    pub fn take_rescale(&self) -> Option<TileBox> {
        self.rescale_slot().take()
    }

    /// Put back a request consumed by an interrupted pass, unless a newer
    /// one arrived in the meantime.
    pub fn restore_rescale(&self, tile_box: TileBox) {
        let mut slot = self.rescale_slot();
        if slot.is_none() {
            *slot = Some(tile_box);
        }
    }

    pub fn pending_rescale(&self) -> Option<TileBox> {
        *self.rescale_slot()
    }
}

/// Held by the worker while it decodes and publishes one entry.
pub struct StepGuard<'a> {
    control: &'a WorkerControl,
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.control.state();
        state.busy = false;
        self.control.cond.notify_all();
    }
}

/// Held by the UI while it replaces the listing, queue and cache.
pub struct MutationGuard<'a> {
    control: &'a WorkerControl,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.control.state();
        state.mutating = false;
        self.control.cond.notify_all();
    }
}
