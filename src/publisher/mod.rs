//! Publisher Module
//!
//! The low-priority side of the hand-off: pull records one at a time and
//! deliver them. Delivery is best effort. A failed publish is logged and the
//! record is gone; there is no retry and nothing here can stall acquisition.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

mod console;
mod http;
mod payload;

pub use self::console::LogPublisher;
pub use self::http::HttpPublisher;
pub use self::payload::{build_payload, round_to};

use crate::aggregation::StatsRecord;
use crate::pipeline::HandoffReceiver;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Record delivery backend.
#[async_trait]
pub trait Publisher: Send + 'static {
    async fn publish(&mut self, record: &StatsRecord) -> Result<(), PublishError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Box<P> {
    async fn publish(&mut self, record: &StatsRecord) -> Result<(), PublishError> {
        (**self).publish(record).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Totals for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherSummary {
    pub published: u64,
    pub failed: u64,
}

/// Drain the hand-off until the acquisition side closes it.
pub async fn run_publisher<P: Publisher + ?Sized>(
    mut rx: HandoffReceiver,
    publisher: &mut P,
) -> PublisherSummary {
    let mut summary = PublisherSummary::default();
    info!(publisher = publisher.name(), "Publisher started");

    while let Some(record) = rx.recv().await {
        match publisher.publish(&record).await {
            Ok(()) => summary.published += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(sequence = record.sequence, error = %e, "Failed to publish stats record");
            }
        }
    }

    info!(
        published = summary.published,
        failed = summary.failed,
        "Publisher stopped, stream closed"
    );
    summary
}
