//! Per-window summary statistics and the record handed to the publisher.

use chrono::{DateTime, Utc};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Population statistics over one channel's batch RMS values for a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Population standard deviation (divisor n)
    pub sd: f64,
    /// Batch RMS values reduced
    pub count: usize,
    pub has_data: bool,
}

impl WindowStats {
    /// The explicit "no data" record: all fields zero, `has_data` false.
    pub const fn no_data() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            avg: 0.0,
            sd: 0.0,
            count: 0,
            has_data: false,
        }
    }

    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::no_data();
        }
        let min = Statistics::min(values);
        let max = Statistics::max(values);
        if min == max {
            return Self {
                min,
                max,
                avg: min,
                sd: 0.0,
                count: values.len(),
                has_data: true,
            };
        }
        Self {
            min,
            max,
            avg: Statistics::mean(values).clamp(min, max),
            sd: Statistics::population_std_dev(values),
            count: values.len(),
            has_data: true,
        }
    }
}

/// One channel's entry in a [`StatsRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelWindow {
    pub channel: u8,
    pub label: String,
    #[serde(flatten)]
    pub stats: WindowStats,
}

/// Everything one closed window produced. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRecord {
    /// Per-run count of emitted records, starting at 1. Suppressed empty
    /// windows do not consume a number.
    pub sequence: u64,
    pub window_end: DateTime<Utc>,
    pub channels: Vec<ChannelWindow>,
}

impl StatsRecord {
    pub fn has_data(&self) -> bool {
        self.channels.iter().any(|c| c.stats.has_data)
    }

    pub fn channel(&self, label: &str) -> Option<&ChannelWindow> {
        self.channels.iter().find(|c| c.label == label)
    }
}
