//! The time-sensitive task: wait for data-ready, drain, reduce, aggregate,
//! offer.
//!
//! The loop suspends in exactly one place, the data-ready wait (raced
//! against cancellation). Everything after a wake runs to completion without
//! awaiting, then the task yields once so lower-priority work can run.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::handoff::{HandoffSender, Offer};
use crate::acquisition::{AcquisitionError, DrainStatus, FrameSource};
use crate::aggregation::{AggregatorCounters, WindowAggregator};
use crate::processing::{BatchReducer, ReducerCounters};

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopExit {
    #[default]
    Cancelled,
    /// The source reported it has stopped for good
    SourceStopped,
    /// Unrecoverable device error
    Fault(String),
}

/// Totals for the run summary.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionSummary {
    pub exit: LoopExit,
    pub wakes: u64,
    pub transient_errors: u64,
    pub overruns: u64,
    pub reducer: ReducerCounters,
    pub aggregator: AggregatorCounters,
    pub offers_dropped: u64,
}

enum Cycle {
    Continue,
    Stopped,
    Fault(AcquisitionError),
}

pub struct AcquisitionLoop {
    reducer: BatchReducer,
    aggregator: WindowAggregator,
    handoff: HandoffSender,
    cancel: CancellationToken,
    drain_bytes: usize,
    wakes: u64,
    transient_errors: u64,
    offers_dropped: u64,
}

impl AcquisitionLoop {
    /// `drain_bytes` bounds each drain call; one frame is the usual choice.
    pub fn new(
        reducer: BatchReducer,
        aggregator: WindowAggregator,
        handoff: HandoffSender,
        cancel: CancellationToken,
        drain_bytes: usize,
    ) -> Self {
        Self {
            reducer,
            aggregator,
            handoff,
            cancel,
            drain_bytes: drain_bytes.max(crate::acquisition::ENTRY_BYTES),
            wakes: 0,
            transient_errors: 0,
            offers_dropped: 0,
        }
    }

    /// Run until cancelled or until the source stops or faults.
    ///
    /// On cancellation the source is stopped first, whatever it still holds
    /// is drained, and then the loop exits. The hand-off sender is dropped on
    /// return, which ends the publisher's stream.
    pub async fn run<S: FrameSource + ?Sized>(mut self, source: &mut S) -> AcquisitionSummary {
        let signal = source.signal();
        let mut buf = vec![0u8; self.drain_bytes];

        info!(source = source.source_name(), "Acquisition loop started");

        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received, stopping converter");
                    source.stop();
                    if let Cycle::Fault(e) = self.cycle(source, &mut buf) {
                        warn!(error = %e, "Device error during final drain");
                    }
                    break LoopExit::Cancelled;
                }
                _ = signal.wait() => {}
            }

            self.wakes += 1;
            match self.cycle(source, &mut buf) {
                Cycle::Continue => {}
                Cycle::Stopped => {
                    info!(source = source.source_name(), "Source stopped, ending acquisition");
                    break LoopExit::SourceStopped;
                }
                Cycle::Fault(e) => {
                    error!(error = %e, "Fatal device error, ending acquisition");
                    break LoopExit::Fault(e.to_string());
                }
            }

            tokio::task::yield_now().await;
        };

        AcquisitionSummary {
            exit,
            wakes: self.wakes,
            transient_errors: self.transient_errors,
            overruns: source.overruns(),
            reducer: self.reducer.counters(),
            aggregator: self.aggregator.counters(),
            offers_dropped: self.offers_dropped,
        }
    }

    /// One batch: drain until empty, reduce, feed the window, maybe offer.
    fn cycle<S: FrameSource + ?Sized>(&mut self, source: &mut S, buf: &mut [u8]) -> Cycle {
        let mut outcome = Cycle::Continue;
        loop {
            match source.drain(buf) {
                Ok(DrainStatus::Read(n)) => self.reducer.ingest(&buf[..n]),
                Ok(DrainStatus::WouldBlock) => break,
                Ok(DrainStatus::Stopped) => {
                    outcome = Cycle::Stopped;
                    break;
                }
                Err(e) if e.is_transient() => {
                    self.transient_errors += 1;
                    warn!(error = %e, "ADC unavailable, skipping to next data-ready");
                    break;
                }
                Err(e) => {
                    outcome = Cycle::Fault(e);
                    break;
                }
            }
        }

        if self.reducer.pending_samples() > 0 {
            let batch = self.reducer.finish();
            trace!(
                channels = ?batch.channels.iter().map(|c| (c.channel, c.samples)).collect::<Vec<_>>(),
                "Batch reduced"
            );
            self.aggregator.ingest(&batch);
        }

        if let Some(record) = self.aggregator.maybe_emit() {
            let sequence = record.sequence;
            match self.handoff.offer(record) {
                Offer::Enqueued => debug!(sequence, "Stats record queued"),
                Offer::Dropped | Offer::Closed => self.offers_dropped += 1,
            }
        }

        outcome
    }
}
