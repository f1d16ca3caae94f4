//! HTTP POST delivery of telemetry payloads.

use super::{build_payload, PublishError, Publisher};
use crate::aggregation::StatsRecord;
use crate::config::{NodeConfig, PublisherConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

pub struct HttpPublisher {
    http: reqwest::Client,
    endpoint: String,
    node: NodeConfig,
}

impl HttpPublisher {
    pub fn new(config: &PublisherConfig, node: &NodeConfig) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            node: node.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&mut self, record: &StatsRecord) -> Result<(), PublishError> {
        let body = build_payload(record, &self.node);
        let resp = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = resp.status();
        info!(sequence = record.sequence, status = status.as_u16(), "HTTP POST completed");
        if status.is_success() {
            Ok(())
        } else {
            Err(PublishError::Status(status))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
