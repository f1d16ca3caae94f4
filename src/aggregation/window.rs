//! Windowed aggregator: batch RMS values in, one [`StatsRecord`] per
//! elapsed window out.
//!
//! The boundary advances to the instant the window is closed, not to the
//! ideal next boundary, so window lengths drift by however late the check
//! runs. Callers drive the clock through [`maybe_emit`](WindowAggregator::maybe_emit);
//! tests use [`maybe_emit_at`](WindowAggregator::maybe_emit_at) with fixed instants.

use super::{ChannelWindow, RmsRing, StatsRecord, WindowStats};
use crate::config::{ChannelConfig, WindowConfig};
use crate::processing::BatchRms;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct ChannelState {
    channel: u8,
    label: String,
    ring: RmsRing,
    samples_dropped: u64,
}

/// Lifetime totals, reported in the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorCounters {
    pub windows_closed: u64,
    pub records_emitted: u64,
    pub empty_windows_suppressed: u64,
    pub rms_dropped: u64,
}

pub struct WindowAggregator {
    channels: Vec<ChannelState>,
    duration: Duration,
    emit_empty: bool,
    boundary: Instant,
    counters: AggregatorCounters,
}

impl WindowAggregator {
    /// Start the first window at `now`.
    pub fn create(config: &WindowConfig, channels: &[ChannelConfig], now: Instant) -> Self {
        Self {
            channels: channels
                .iter()
                .map(|ch| ChannelState {
                    channel: ch.id,
                    label: ch.label.clone(),
                    ring: RmsRing::new(config.rms_ring_capacity),
                    samples_dropped: 0,
                })
                .collect(),
            duration: config.duration(),
            emit_empty: config.emit_empty_windows,
            boundary: now,
            counters: AggregatorCounters::default(),
        }
    }

    /// Add one batch's RMS values to the current window.
    pub fn ingest(&mut self, batch: &BatchRms) {
        for result in &batch.channels {
            let Some(state) = self.channels.iter_mut().find(|s| s.channel == result.channel) else {
                continue;
            };
            state.samples_dropped += result.dropped as u64;
            if let Some(rms) = result.rms {
                if !state.ring.push(rms) {
                    self.counters.rms_dropped += 1;
                }
            }
        }
    }

    pub fn maybe_emit(&mut self) -> Option<StatsRecord> {
        self.maybe_emit_at(Instant::now(), Utc::now())
    }

    /// Close the window if at least the configured duration has elapsed
    /// since the last boundary.
    ///
    /// Every ring is reset and the boundary moves to `now` whenever the
    /// window closes, even when the record itself is suppressed because no
    /// channel had data.
    pub fn maybe_emit_at(&mut self, now: Instant, wall: DateTime<Utc>) -> Option<StatsRecord> {
        if now.saturating_duration_since(self.boundary) < self.duration {
            return None;
        }
        self.boundary = now;
        self.counters.windows_closed += 1;
        let sequence = self.counters.records_emitted + 1;

        let mut channels = Vec::with_capacity(self.channels.len());
        for state in &mut self.channels {
            if state.ring.dropped() > 0 || state.samples_dropped > 0 {
                warn!(
                    channel = %state.label,
                    rms_dropped = state.ring.dropped(),
                    samples_dropped = state.samples_dropped,
                    "Capacity exceeded during window, values dropped"
                );
            }
            channels.push(ChannelWindow {
                channel: state.channel,
                label: state.label.clone(),
                stats: WindowStats::from_values(state.ring.values()),
            });
            state.ring.reset();
            state.samples_dropped = 0;
        }

        let record = StatsRecord {
            sequence,
            window_end: wall,
            channels,
        };

        if !record.has_data() && !self.emit_empty {
            self.counters.empty_windows_suppressed += 1;
            debug!(
                window = self.counters.windows_closed,
                "Window closed with no data, record suppressed"
            );
            return None;
        }

        self.counters.records_emitted += 1;
        debug!(
            sequence,
            channels_with_data = record.channels.iter().filter(|c| c.stats.has_data).count(),
            "Window closed"
        );
        Some(record)
    }

    /// RMS values buffered in the open window across all channels.
    pub fn buffered(&self) -> usize {
        self.channels.iter().map(|s| s.ring.len()).sum()
    }

    pub fn counters(&self) -> AggregatorCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ChannelRms;

    const WINDOW_MS: u64 = 1000;

    fn channels() -> Vec<ChannelConfig> {
        vec![ChannelConfig::new(6, "Voltage"), ChannelConfig::new(5, "Current")]
    }

    fn config(capacity: usize, emit_empty: bool) -> WindowConfig {
        WindowConfig {
            duration_ms: WINDOW_MS,
            rms_ring_capacity: capacity,
            emit_empty_windows: emit_empty,
        }
    }

    fn batch(voltage: Option<f64>, current: Option<f64>) -> BatchRms {
        let entry = |channel, rms: Option<f64>| ChannelRms {
            channel,
            rms,
            samples: usize::from(rms.is_some()),
            dropped: 0,
        };
        BatchRms {
            channels: vec![entry(6, voltage), entry(5, current)],
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_no_record_before_window_elapses() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(200, false), &channels(), t0);
        agg.ingest(&batch(Some(1.0), Some(2.0)));
        assert!(agg.maybe_emit_at(t0 + ms(999), Utc::now()).is_none());
        assert_eq!(agg.buffered(), 2);
    }

    #[test]
    fn test_window_reduces_and_resets() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(200, false), &channels(), t0);
        for v in [99.0, 100.0, 101.0] {
            agg.ingest(&batch(Some(v), Some(5.0)));
        }
        let record = agg.maybe_emit_at(t0 + ms(WINDOW_MS), Utc::now()).unwrap();

        let voltage = record.channel("Voltage").unwrap().stats;
        assert_eq!((voltage.min, voltage.max, voltage.count), (99.0, 101.0, 3));
        assert!((voltage.avg - 100.0).abs() < 1e-12);
        let current = record.channel("Current").unwrap().stats;
        assert_eq!(current.sd, 0.0);
        assert_eq!(record.sequence, 1);
        assert_eq!(agg.buffered(), 0, "rings reset after reduction");
    }

    #[test]
    fn test_empty_channel_does_not_suppress_sibling() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(200, false), &channels(), t0);
        agg.ingest(&batch(None, Some(3.0)));
        let record = agg.maybe_emit_at(t0 + ms(WINDOW_MS), Utc::now()).unwrap();

        assert_eq!(record.channel("Voltage").unwrap().stats, WindowStats::no_data());
        assert!(record.channel("Current").unwrap().stats.has_data);
    }

    #[test]
    fn test_all_empty_window_suppressed_by_default() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(200, false), &channels(), t0);
        assert!(agg.maybe_emit_at(t0 + ms(WINDOW_MS), Utc::now()).is_none());
        assert_eq!(agg.counters().windows_closed, 1);
        assert_eq!(agg.counters().empty_windows_suppressed, 1);

        let mut agg = WindowAggregator::create(&config(200, true), &channels(), t0);
        let record = agg.maybe_emit_at(t0 + ms(WINDOW_MS), Utc::now()).unwrap();
        assert!(!record.has_data());
    }

    #[test]
    fn test_suppressed_window_leaves_no_sequence_gap() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(200, false), &channels(), t0);
        assert!(agg.maybe_emit_at(t0 + ms(WINDOW_MS), Utc::now()).is_none());

        agg.ingest(&batch(Some(1.0), None));
        let record = agg.maybe_emit_at(t0 + ms(2 * WINDOW_MS), Utc::now()).unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(agg.counters().windows_closed, 2);
    }

    #[test]
    fn test_boundary_advances_to_close_time() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(200, true), &channels(), t0);
        assert!(agg.maybe_emit_at(t0 + ms(1500), Utc::now()).is_some());
        // Next boundary is 1500 + 1000, not 2000
        assert!(agg.maybe_emit_at(t0 + ms(2400), Utc::now()).is_none());
        let second = agg.maybe_emit_at(t0 + ms(2500), Utc::now()).unwrap();
        assert_eq!(second.sequence, 2);
    }

    #[test]
    fn test_full_ring_drops_newest_rms() {
        let t0 = Instant::now();
        let mut agg = WindowAggregator::create(&config(2, false), &channels(), t0);
        for v in [1.0, 2.0, 50.0] {
            agg.ingest(&batch(Some(v), None));
        }
        assert_eq!(agg.counters().rms_dropped, 1);
        let record = agg.maybe_emit_at(t0 + ms(WINDOW_MS), Utc::now()).unwrap();
        assert_eq!(record.channel("Voltage").unwrap().stats.max, 2.0);
    }
}
