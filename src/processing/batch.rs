//! Channel demultiplexer and batch AC-RMS reducer.
//!
//! One batch is everything drained between two waits. Entries are split by
//! channel id, masked to the converter resolution and calibrated, then each
//! channel's sample set is reduced to a single AC-RMS value when the batch
//! completes.

use super::Calibration;
use crate::acquisition::entries;
use crate::config::AcquisitionConfig;
use statrs::statistics::Statistics;
use std::sync::Arc;

/// AC RMS of `values`: the population standard deviation, i.e. the RMS of
/// the signal after its mean is removed.
///
/// Returns `None` for an empty set. A constant set yields exactly `0.0`.
pub fn ac_rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let min = Statistics::min(values);
    let max = Statistics::max(values);
    if min == max {
        return Some(0.0);
    }
    Some(Statistics::population_std_dev(values))
}

/// Result of one channel for one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRms {
    pub channel: u8,
    /// `None` when the channel contributed no samples this batch
    pub rms: Option<f64>,
    pub samples: usize,
    pub dropped: usize,
}

/// All monitored channels for one completed batch, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRms {
    pub channels: Vec<ChannelRms>,
}

impl BatchRms {
    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(|c| c.rms.is_none())
    }
}

/// Lifetime totals, reported in the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReducerCounters {
    pub batches: u64,
    pub samples_accepted: u64,
    pub samples_dropped: u64,
    pub unknown_entries: u64,
}

struct SampleSet {
    channel: u8,
    samples: Vec<f64>,
    dropped: usize,
}

pub struct BatchReducer {
    sets: Vec<SampleSet>,
    budget: usize,
    code_mask: u16,
    calibration: Arc<dyn Calibration>,
    counters: ReducerCounters,
}

impl BatchReducer {
    pub fn new(config: &AcquisitionConfig, calibration: Arc<dyn Calibration>) -> Self {
        let budget = config.batch_sample_budget;
        Self {
            sets: config
                .channels
                .iter()
                .map(|ch| SampleSet {
                    channel: ch.id,
                    samples: Vec::with_capacity(budget),
                    dropped: 0,
                })
                .collect(),
            budget,
            code_mask: config.max_code(),
            calibration,
            counters: ReducerCounters::default(),
        }
    }

    /// Demultiplex one drained chunk into the current batch.
    ///
    /// Samples past the per-channel budget are counted and discarded, as
    /// are entries for channels that are not being monitored.
    pub fn ingest(&mut self, bytes: &[u8]) {
        for entry in entries(bytes) {
            let Some(set) = self.sets.iter_mut().find(|s| s.channel == entry.channel) else {
                self.counters.unknown_entries += 1;
                continue;
            };
            if set.samples.len() >= self.budget {
                set.dropped += 1;
                self.counters.samples_dropped += 1;
                continue;
            }
            let code = entry.code & self.code_mask;
            set.samples.push(self.calibration.to_physical(code, entry.channel));
            self.counters.samples_accepted += 1;
        }
    }

    /// Samples buffered in the current batch across all channels.
    pub fn pending_samples(&self) -> usize {
        self.sets.iter().map(|s| s.samples.len()).sum()
    }

    /// Close the batch: reduce every channel and reset the sample sets.
    pub fn finish(&mut self) -> BatchRms {
        self.counters.batches += 1;
        let channels = self
            .sets
            .iter_mut()
            .map(|set| {
                let result = ChannelRms {
                    channel: set.channel,
                    rms: ac_rms(&set.samples),
                    samples: set.samples.len(),
                    dropped: set.dropped,
                };
                set.samples.clear();
                set.dropped = 0;
                result
            })
            .collect();
        BatchRms { channels }
    }

    pub fn counters(&self) -> ReducerCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{encode_into, RawEntry};
    use crate::config::ChannelConfig;

    fn identity() -> Arc<dyn Calibration> {
        Arc::new(|raw: u16, _channel: u8| f64::from(raw))
    }

    fn config(budget: usize) -> AcquisitionConfig {
        AcquisitionConfig {
            batch_sample_budget: budget,
            channels: vec![ChannelConfig::new(6, "Voltage"), ChannelConfig::new(5, "Current")],
            ..AcquisitionConfig::default()
        }
    }

    fn encoded(items: &[RawEntry]) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_into(items, &mut buf);
        buf
    }

    #[test]
    fn test_ac_rms_of_constant_is_zero() {
        assert_eq!(ac_rms(&[100.0; 50]), Some(0.0));
        assert_eq!(ac_rms(&[3.7]), Some(0.0));
        assert_eq!(ac_rms(&[]), None);
    }

    #[test]
    fn test_ac_rms_removes_dc() {
        let square: Vec<f64> = (0..1000).map(|i| if i % 2 == 0 { 0.0 } else { 200.0 }).collect();
        let rms = ac_rms(&square).unwrap();
        assert!((rms - 100.0).abs() < 1e-9, "got {rms}");

        let shifted: Vec<f64> = square.iter().map(|v| v + 5000.0).collect();
        assert!((ac_rms(&shifted).unwrap() - rms).abs() < 1e-6);
    }

    #[test]
    fn test_ac_rms_positive_for_varying_signal() {
        assert!(ac_rms(&[1.0, 1.0, 1.0, 1.000001]).unwrap() > 0.0);
    }

    #[test]
    fn test_demux_splits_channels() {
        let mut reducer = BatchReducer::new(&config(16), identity());
        reducer.ingest(&encoded(&[
            RawEntry::new(6, 0),
            RawEntry::new(5, 7),
            RawEntry::new(6, 200),
            RawEntry::new(5, 7),
        ]));
        let batch = reducer.finish();

        assert_eq!(batch.channels[0].channel, 6);
        assert!((batch.channels[0].rms.unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(batch.channels[1].rms, Some(0.0));
        assert_eq!(reducer.pending_samples(), 0, "sets reset after finish");
    }

    #[test]
    fn test_budget_overflow_counted_not_processed() {
        let mut reducer = BatchReducer::new(&config(2), identity());
        reducer.ingest(&encoded(&[
            RawEntry::new(6, 10),
            RawEntry::new(6, 20),
            RawEntry::new(6, 4000),
        ]));
        let batch = reducer.finish();

        let v = batch.channels[0];
        assert_eq!(v.samples, 2);
        assert_eq!(v.dropped, 1);
        assert!((v.rms.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(reducer.counters().samples_dropped, 1);
    }

    #[test]
    fn test_silent_channel_does_not_block_sibling() {
        let mut reducer = BatchReducer::new(&config(16), identity());
        reducer.ingest(&encoded(&[RawEntry::new(5, 1), RawEntry::new(5, 3)]));
        let batch = reducer.finish();

        assert_eq!(batch.channels[0].rms, None);
        assert_eq!(batch.channels[1].rms, Some(1.0));
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_unknown_channel_and_resolution_mask() {
        let mut reducer = BatchReducer::new(&config(16), identity());
        reducer.ingest(&encoded(&[RawEntry::new(2, 100), RawEntry::new(6, 0x1FFF)]));
        reducer.ingest(&encoded(&[RawEntry::new(6, 0x0FFF)]));
        let batch = reducer.finish();

        assert_eq!(reducer.counters().unknown_entries, 1);
        // 0x1FFF masked to 12 bits equals the second sample
        assert_eq!(batch.channels[0].rms, Some(0.0));
        assert_eq!(batch.channels[0].samples, 2);
    }
}
