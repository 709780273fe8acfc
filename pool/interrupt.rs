//! Cross-thread interruption for waiting callers and interruptible work.
//!
//! Threads here cannot be interrupted from outside, so interruption is an
//! explicit handle. Firing it closes a channel; every receiver selecting on
//! that channel wakes at once, which makes a single `interrupt()` a broadcast
//! to all waits registered against the handle.

use crate::error::WorkError;
use crossbeam_channel::{Receiver, Sender, bounded, select};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct Interrupter {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    fired: AtomicBool,
}

impl Interrupter {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            trigger: Mutex::new(Some(trigger)),
            signal,
            fired: AtomicBool::new(false),
        }
    }

    /// Fires the interrupt. Idempotent; the handle stays fired afterwards, so any
    /// later wait against it fails immediately.
    pub fn interrupt(&self) {
        self.fired.store(true, Ordering::Release);
        let trigger = match self.trigger.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(trigger);
    }

    pub fn is_interrupted(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Becomes ready (disconnected) once `interrupt` has been called.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Blocks the current thread for `duration` unless interrupted first.
    pub fn sleep(&self, duration: Duration) -> Result<(), WorkError> {
        select! {
            recv(self.signal) -> _ => Err(WorkError::Interrupted),
            default(duration) => Ok(()),
        }
    }
}

impl Default for Interrupter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupter")
            .field("fired", &self.is_interrupted())
            .finish()
    }
}
