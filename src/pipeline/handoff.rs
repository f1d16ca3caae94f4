//! Bounded hand-off between the acquisition task and the publisher.
//!
//! Offering never waits: when the queue is full the new record is dropped
//! and counted. Receiving waits indefinitely and returns `None` once the
//! sender is gone and the queue is empty. Delivery is at-most-once and in
//! window order.

use crate::aggregation::StatsRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Result of a non-blocking offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Enqueued,
    /// Queue full; the offered record was discarded
    Dropped,
    /// Receiver gone; the offered record was discarded
    Closed,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

/// Snapshot of hand-off traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
}

/// Read-only view of the counters that outlives both ends.
#[derive(Debug, Clone)]
pub struct HandoffMonitor {
    counters: Arc<Counters>,
    capacity: usize,
}

impl HandoffMonitor {
    pub fn stats(&self) -> HandoffStats {
        HandoffStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct HandoffSender {
    tx: mpsc::Sender<StatsRecord>,
    counters: Arc<Counters>,
}

pub struct HandoffReceiver {
    rx: mpsc::Receiver<StatsRecord>,
    counters: Arc<Counters>,
}

/// Create a hand-off of `capacity` records (minimum 1).
pub fn channel(capacity: usize) -> (HandoffSender, HandoffReceiver, HandoffMonitor) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let counters = Arc::new(Counters::default());
    (
        HandoffSender {
            tx,
            counters: Arc::clone(&counters),
        },
        HandoffReceiver {
            rx,
            counters: Arc::clone(&counters),
        },
        HandoffMonitor { counters, capacity },
    )
}

impl HandoffSender {
    /// Enqueue without waiting; drop the record if the queue is full.
    pub fn offer(&self, record: StatsRecord) -> Offer {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Offer::Enqueued
            }
            Err(TrySendError::Full(record)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    sequence = record.sequence,
                    dropped_total = dropped,
                    "Stats queue full, dropping record"
                );
                Offer::Dropped
            }
            Err(TrySendError::Closed(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = record.sequence, "Publisher gone, discarding record");
                Offer::Closed
            }
        }
    }

    /// End the stream. The receiver sees `None` after draining what is queued.
    pub fn close(self) {}
}

impl HandoffReceiver {
    /// Wait for the next record; `None` at end of stream.
    pub async fn recv(&mut self) -> Option<StatsRecord> {
        let record = self.rx.recv().await?;
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        Some(record)
    }

    /// Records currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
