//! Per-batch completion counter.
//!
//! The counter is an atomic countdown. The decrement that takes it to zero
//! sends on a one-slot channel, and the waiting caller blocks on that channel
//! (selecting alongside an optional deadline and interrupt). Every decrement is
//! an `AcqRel` read-modify-write, so the zero-crossing decrement carries all
//! earlier workers' report writes with it, and the channel hand-off carries them
//! on to the caller.

use crate::interrupt::Interrupter;
use crossbeam_channel::{Receiver, Sender, after, bounded, never, select};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a wait on a [`CompletionCounter`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Released,
    Interrupted,
    TimedOut,
}

pub struct CompletionCounter {
    remaining: AtomicUsize,
    total: usize,
    zero_tx: Sender<()>,
    zero_rx: Receiver<()>,
}

impl CompletionCounter {
    pub fn new(total: usize) -> Self {
        let (zero_tx, zero_rx) = bounded(1);
        Self {
            remaining: AtomicUsize::new(total),
            total,
            zero_tx,
            zero_rx,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Decrements once. Returns `false` if the counter was already at zero, in
    /// which case nothing changes.
    pub fn count_down(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                // Only one decrement can observe 1, so the slot is always free.
                let _ = self.zero_tx.try_send(());
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// A guard that counts down exactly once when dropped, including during a
    /// panic unwind or when the task owning it is discarded unrun.
    pub fn guard(self: &Arc<Self>) -> CountdownGuard {
        CountdownGuard {
            counter: Arc::clone(self),
        }
    }

    /// Blocks until the count reaches zero, the deadline passes, or the
    /// interrupter fires.
    pub fn wait(&self, timeout: Option<Duration>, interrupter: Option<&Interrupter>) -> WaitOutcome {
        if self.remaining() == 0 {
            return WaitOutcome::Released;
        }

        let deadline = timeout.map(after).unwrap_or_else(never);
        let interrupt = interrupter
            .map(|i| i.signal().clone())
            .unwrap_or_else(never);

        select! {
            recv(self.zero_rx) -> _ => WaitOutcome::Released,
            recv(interrupt) -> _ => WaitOutcome::Interrupted,
            recv(deadline) -> _ => WaitOutcome::TimedOut,
        }
    }
}

impl std::fmt::Debug for CompletionCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionCounter")
            .field("remaining", &self.remaining())
            .field("total", &self.total)
            .finish()
    }
}

pub struct CountdownGuard {
    counter: Arc<CompletionCounter>,
}

impl Drop for CountdownGuard {
    fn drop(&mut self) {
        self.counter.count_down();
    }
}
