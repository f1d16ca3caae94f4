//! Flat JSON telemetry body.
//!
//! ```json
//! {"nodeId": "", "level": "info", "timestamp": "2026-01-01T00:00:01.000Z",
//!  "Voltage_min": 812.25, "Voltage_max": 815.0, "Voltage_avg": 813.5, "Voltage_sd": 0.6,
//!  "Current_min": 0.0, ...}
//! ```
//!
//! Numbers carry at most three decimals. Channels without data report zeros.

use crate::aggregation::StatsRecord;
use crate::config::defaults::PAYLOAD_DECIMALS;
use crate::config::NodeConfig;
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn build_payload(record: &StatsRecord, node: &NodeConfig) -> Value {
    let mut body = Map::new();
    body.insert("nodeId".to_string(), json!(node.id));
    body.insert("level".to_string(), json!(node.level));
    body.insert(
        "timestamp".to_string(),
        json!(record.window_end.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    for ch in &record.channels {
        let s = ch.stats;
        for (suffix, value) in [("min", s.min), ("max", s.max), ("avg", s.avg), ("sd", s.sd)] {
            body.insert(
                format!("{}_{}", ch.label, suffix),
                json!(round_to(value, PAYLOAD_DECIMALS)),
            );
        }
    }
    Value::Object(body)
}
