//! Wire a source, the acquisition loop, the hand-off and a publisher
//! together and run them to completion.
//!
//! Shutdown order on cancellation: the acquisition task stops the source,
//! drains it and exits, dropping the hand-off sender; the publisher then
//! empties the queue, sees end of stream and exits.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::acquisition_loop::{AcquisitionLoop, AcquisitionSummary};
use super::handoff::{self, HandoffStats};
use crate::acquisition::FrameSource;
use crate::aggregation::WindowAggregator;
use crate::config::MonitorConfig;
use crate::processing::{BatchReducer, Calibration};
use crate::publisher::{run_publisher, Publisher, PublisherSummary};

/// Everything the run produced, for the shutdown summary.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub acquisition: AcquisitionSummary,
    pub handoff: HandoffStats,
    pub publisher: PublisherSummary,
}

/// Start `source`, run both tasks, and return once the publisher has seen
/// end of stream.
///
/// Fails before spawning anything if the source cannot start. A fatal
/// device error during the run is reported through
/// [`AcquisitionSummary::exit`], not as an `Err`.
pub async fn run_pipeline<S, P>(
    config: &MonitorConfig,
    mut source: S,
    mut publisher: P,
    calibration: Arc<dyn Calibration>,
    cancel: CancellationToken,
) -> Result<PipelineReport>
where
    S: FrameSource,
    P: Publisher,
{
    source
        .start()
        .with_context(|| format!("Failed to start source '{}'", source.source_name()))?;

    let (tx, rx, monitor) = handoff::channel(config.handoff.queue_capacity);
    let publisher_task = tokio::spawn(async move { run_publisher(rx, &mut publisher).await });

    let reducer = BatchReducer::new(&config.acquisition, calibration);
    let aggregator =
        WindowAggregator::create(&config.window, &config.acquisition.channels, Instant::now());
    let acquisition = AcquisitionLoop::new(
        reducer,
        aggregator,
        tx,
        cancel,
        config.acquisition.frame_bytes,
    );
    let acquisition_task = tokio::spawn(async move { acquisition.run(&mut source).await });

    let acquisition = acquisition_task.await.context("Acquisition task panicked")?;
    let publisher = publisher_task.await.context("Publisher task panicked")?;
    let handoff = monitor.stats();

    info!(exit = ?acquisition.exit, "Pipeline stopped");
    Ok(PipelineReport {
        acquisition,
        handoff,
        publisher,
    })
}
