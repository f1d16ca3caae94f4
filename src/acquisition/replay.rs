//! Replay of recorded conversions from CSV.
//!
//! File format, one conversion per line:
//!
//! ```text
//! channel,raw
//! 6,2048
//! 5,1996
//! ```
//!
//! The header and `#` comment lines are skipped; malformed lines are logged
//! and skipped. Entries are cut into frames and written at the recorded
//! rate scaled by `speed` (0 means as fast as the consumer keeps up). The
//! source stops at end of file.

use super::{
    check_capabilities, AcquisitionError, DataReadySignal, DrainStatus, FrameRing, FrameSource,
    RawEntry,
};
use crate::config::AcquisitionConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read replay file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Replay file {0} contains no conversions")]
    Empty(PathBuf),

    #[error("Replay speed must be finite and >= 0, got {0}")]
    InvalidSpeed(f64),

    #[error("Replay speed {0} gives a frame period that cannot be represented")]
    PeriodOutOfRange(f64),

    #[error("Unsupported ADC configuration for replay: {}", .0.join("; "))]
    Unsupported(Vec<String>),
}

/// Parse a replay CSV file into raw entries.
pub fn load_replay_csv(path: &Path) -> Result<Vec<RawEntry>, ReplayError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut items = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("channel") {
            continue;
        }
        match parse_line(line) {
            Some(entry) => items.push(entry),
            None => {
                skipped += 1;
                warn!(line = line_no + 1, content = %line, "Skipping malformed replay line");
            }
        }
    }

    if items.is_empty() {
        return Err(ReplayError::Empty(path.to_path_buf()));
    }
    info!(
        path = %path.display(),
        conversions = items.len(),
        skipped,
        "Loaded replay file"
    );
    Ok(items)
}

fn parse_line(line: &str) -> Option<RawEntry> {
    let mut parts = line.split(',');
    let channel = parts.next()?.trim().parse::<u8>().ok()?;
    let code = parts.next()?.trim().parse::<u16>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(RawEntry::new(channel, code))
}

pub struct ReplaySource {
    ring: FrameRing,
    pending: Option<Vec<RawEntry>>,
    entries_per_frame: usize,
    frame_period: Option<Duration>,
    running: Arc<AtomicBool>,
}

impl ReplaySource {
    pub fn new(
        items: Vec<RawEntry>,
        acq: &AcquisitionConfig,
        speed: f64,
    ) -> Result<Self, ReplayError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(ReplayError::InvalidSpeed(speed));
        }
        check_capabilities(acq).map_err(|e| match e {
            AcquisitionError::Unsupported(errors) => ReplayError::Unsupported(errors),
            other => ReplayError::Unsupported(vec![other.to_string()]),
        })?;

        let entries_per_frame = acq.entries_per_frame().max(1);
        let frame_period = if speed > 0.0 {
            let conversions_per_sec = f64::from(acq.sample_rate_hz) * acq.channels.len() as f64;
            let secs = entries_per_frame as f64 / conversions_per_sec / speed;
            let period = Duration::try_from_secs_f64(secs)
                .map_err(|_| ReplayError::PeriodOutOfRange(speed))?;
            Some(period)
        } else {
            None
        };

        Ok(Self {
            ring: FrameRing::new(acq.frame_bytes, acq.store_frames()),
            pending: Some(items),
            entries_per_frame,
            frame_period,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_file(path: &Path, acq: &AcquisitionConfig, speed: f64) -> Result<Self, ReplayError> {
        Self::new(load_replay_csv(path)?, acq, speed)
    }
}

impl FrameSource for ReplaySource {
    fn start(&mut self) -> Result<(), AcquisitionError> {
        let Some(items) = self.pending.take() else {
            return Ok(());
        };

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let ring = self.ring.clone();
        let per_frame = self.entries_per_frame;
        let period = self.frame_period;

        std::thread::Builder::new()
            .name("adc-replay".to_string())
            .spawn(move || {
                for chunk in items.chunks(per_frame) {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    match period {
                        Some(p) => std::thread::sleep(p),
                        // Unpaced: wait for room instead of overwriting
                        None => {
                            while ring.free_frames() == 0 && running.load(Ordering::Acquire) {
                                std::thread::sleep(Duration::from_millis(1));
                            }
                        }
                    }
                    ring.write_frame_with(|buf| super::encode_into(chunk, buf));
                }
                ring.halt();
            })
            .map_err(|e| AcquisitionError::Fault(format!("failed to spawn replay thread: {e}")))?;

        info!(
            paced = self.frame_period.is_some(),
            "Replay source started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.ring.halt();
    }

    fn drain(&mut self, buf: &mut [u8]) -> Result<DrainStatus, AcquisitionError> {
        self.ring.drain(buf)
    }

    fn signal(&self) -> DataReadySignal {
        self.ring.signal()
    }

    fn source_name(&self) -> &str {
        "replay"
    }

    fn overruns(&self) -> u64 {
        self.ring.overruns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_skips_header_comments_and_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channel,raw").unwrap();
        writeln!(file, "# captured on bench supply").unwrap();
        writeln!(file, "6,2048").unwrap();
        writeln!(file, "5,not-a-number").unwrap();
        writeln!(file, "5, 1990").unwrap();
        writeln!(file, "6,1,2").unwrap();

        let items = load_replay_csv(file.path()).unwrap();
        assert_eq!(items, vec![RawEntry::new(6, 2048), RawEntry::new(5, 1990)]);
    }

    #[test]
    fn test_load_empty_file_is_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            load_replay_csv(file.path()),
            Err(ReplayError::Empty(_))
        ));
    }

    #[test]
    fn test_negative_speed_rejected() {
        let result = ReplaySource::new(
            vec![RawEntry::new(6, 1)],
            &AcquisitionConfig::default(),
            -1.0,
        );
        assert!(matches!(result, Err(ReplayError::InvalidSpeed(_))));
    }

    #[test]
    fn test_unsupported_rate_rejected() {
        let acq = AcquisitionConfig {
            sample_rate_hz: 0,
            ..AcquisitionConfig::default()
        };
        match ReplaySource::new(vec![RawEntry::new(6, 1)], &acq, 1.0) {
            Err(ReplayError::Unsupported(errors)) => {
                assert!(errors.iter().any(|e| e.contains("sample_rate_hz")));
            }
            Err(other) => panic!("expected Unsupported, got {other:?}"),
            Ok(_) => panic!("expected Unsupported, got a source"),
        }
    }

    #[test]
    fn test_tiny_speed_rejected_instead_of_panicking() {
        let result = ReplaySource::new(
            vec![RawEntry::new(6, 1)],
            &AcquisitionConfig::default(),
            1e-30,
        );
        assert!(matches!(result, Err(ReplayError::PeriodOutOfRange(_))));
    }

    #[test]
    fn test_slow_speed_still_paces() {
        let source =
            ReplaySource::new(vec![RawEntry::new(6, 1)], &AcquisitionConfig::default(), 0.5)
                .unwrap();
        assert!(source.frame_period.is_some());
    }

    #[tokio::test]
    async fn test_unpaced_replay_delivers_everything_then_stops() {
        let acq = AcquisitionConfig::default();
        let items: Vec<_> = (0..1000u16).map(|i| RawEntry::new(6, i % 4096)).collect();
        let mut source = ReplaySource::new(items, &acq, 0.0).unwrap();
        let signal = source.signal();
        source.start().unwrap();

        let mut buf = vec![0u8; acq.frame_bytes];
        let mut total = 0;
        loop {
            match source.drain(&mut buf).unwrap() {
                DrainStatus::Read(n) => total += n / crate::acquisition::ENTRY_BYTES,
                DrainStatus::WouldBlock => {
                    tokio::time::timeout(Duration::from_secs(2), signal.wait())
                        .await
                        .expect("replay stalled");
                }
                DrainStatus::Stopped => break,
            }
        }
        assert_eq!(total, 1000);
        assert_eq!(source.overruns(), 0);
    }
}
