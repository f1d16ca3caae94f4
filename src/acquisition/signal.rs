//! Data-ready signal: the bridge from the converter's completion interrupt
//! to the acquisition task.
//!
//! The raising side runs in interrupt context (or the thread emulating it).
//! It does one thing, wake the single consumer, and reports whether that
//! consumer was actually parked so the caller can request an immediate
//! reschedule. It never allocates, blocks or logs.
//!
//! Wakes are coalesced: while the consumer is busy, any number of raises
//! collapse into one stored permit. The consumer compensates by draining
//! until the source is empty instead of counting wakes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Single-slot wake primitive shared by one raiser and one waiter.
#[derive(Debug, Clone, Default)]
pub struct DataReadySignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    notify: Notify,
    waiting: AtomicBool,
}

/// Clears the parked flag even when the wait is cancelled mid-flight.
struct Parked<'a>(&'a AtomicBool);

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DataReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the consumer.
    ///
    /// Returns `true` when the consumer was parked in [`wait`](Self::wait)
    /// and has just become runnable.
    pub fn raise(&self) -> bool {
        let was_parked = self.inner.waiting.swap(false, Ordering::AcqRel);
        self.inner.notify.notify_one();
        was_parked
    }

    /// Park until the next raise. Returns immediately if a raise is
    /// already pending.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        self.inner.waiting.store(true, Ordering::Release);
        let _parked = Parked(&self.inner.waiting);
        notified.await;
    }
}
