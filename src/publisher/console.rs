//! Dry-run delivery: log the payload instead of sending it.

use super::{build_payload, PublishError, Publisher};
use crate::aggregation::StatsRecord;
use crate::config::NodeConfig;
use async_trait::async_trait;
use tracing::info;

pub struct LogPublisher {
    node: NodeConfig,
}

impl LogPublisher {
    pub fn new(node: &NodeConfig) -> Self {
        Self { node: node.clone() }
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&mut self, record: &StatsRecord) -> Result<(), PublishError> {
        let body = serde_json::to_string(&build_payload(record, &self.node))?;
        info!(sequence = record.sequence, payload = %body, "Stats record");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
