// Per-unit completion flags shared between pollers and the controller.
//
// Each flag is consume-on-read: a take_* call returns the current value and
// clears it in one atomic swap. There is no queueing, so two completions of
// the same kind before a read collapse into one.

use std::sync::atomic::{AtomicBool, Ordering};

/// Task-completion state for one wheel unit.
///
/// Pollers are the writers (one outcome sets exactly one flag); the
/// controller's accessors are the readers.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    drive_done: AtomicBool,
    turn_done: AtomicBool,
    failed: AtomicBool,
}

impl CompletionTracker {
    pub fn mark_drive_done(&self) {
        self.drive_done.store(true, Ordering::SeqCst);
    }

    pub fn mark_turn_done(&self) {
        self.turn_done.store(true, Ordering::SeqCst);
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Read and clear the drive-motor-done flag
    pub fn take_drive_done(&self) -> bool {
        self.drive_done.swap(false, Ordering::SeqCst)
    }

    /// Read and clear the turn-motor-done flag
    pub fn take_turn_done(&self) -> bool {
        self.turn_done.swap(false, Ordering::SeqCst)
    }

    /// Read and clear the failure flag
    pub fn take_failed(&self) -> bool {
        self.failed.swap(false, Ordering::SeqCst)
    }
}
