//! Acquisition Module
//!
//! Continuous-mode ADC front end. A source owns the converter (real,
//! simulated, replayed or test-injected), writes fixed-size frames into a
//! bounded store, and raises a [`DataReadySignal`] on every completed frame.
//! The acquisition task drains the store in whole entries through the
//! [`FrameSource`] trait.

use thiserror::Error;

mod claim;
mod frame;
mod injected;
mod replay;
mod ring;
mod signal;
mod simulated;

pub use claim::DeviceClaim;
pub use frame::{encode_into, entries, RawEntry, ENTRY_BYTES};
pub use injected::{FrameInjector, InjectedSource};
pub use replay::{load_replay_csv, ReplayError, ReplaySource};
pub use ring::FrameRing;
pub use signal::DataReadySignal;
pub use simulated::{SignalGenerator, SimulatedAdc};

use crate::config::AcquisitionConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Unsupported acquisition configuration: {}", .0.join("; "))]
    Unsupported(Vec<String>),

    #[error("ADC unit {0} is already claimed")]
    DeviceBusy(u8),

    /// Transient: the next drain may succeed
    #[error("ADC temporarily unavailable: {0}")]
    Unavailable(String),

    /// Fatal: the source cannot produce further data
    #[error("ADC fault: {0}")]
    Fault(String),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

impl AcquisitionError {
    /// Whether the acquisition loop should retry on the next data-ready event.
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquisitionError::Unavailable(_))
    }
}

/// Outcome of a single non-blocking drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// This many bytes (a whole number of entries) were copied out
    Read(usize),
    /// The store is empty right now
    WouldBlock,
    /// The store is empty and the converter has stopped for good
    Stopped,
}

// ============================================================================
// Frame Source Trait
// ============================================================================

/// A continuous-mode converter as seen by the acquisition task.
///
/// `drain` never blocks. The task waits on [`signal`](FrameSource::signal)
/// and then drains until `WouldBlock`.
pub trait FrameSource: Send + 'static {
    /// Begin continuous conversion. Calling twice is a no-op.
    fn start(&mut self) -> Result<(), AcquisitionError>;

    /// Stop conversion. Data already in the store stays drainable.
    fn stop(&mut self);

    /// Copy up to `buf.len()` bytes of whole entries out of the store.
    fn drain(&mut self, buf: &mut [u8]) -> Result<DrainStatus, AcquisitionError>;

    /// Handle to the data-ready signal raised on every completed frame.
    fn signal(&self) -> DataReadySignal;

    /// Human-readable name for logs
    fn source_name(&self) -> &str;

    /// Frames overwritten before they were drained.
    fn overruns(&self) -> u64 {
        0
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn start(&mut self) -> Result<(), AcquisitionError> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn drain(&mut self, buf: &mut [u8]) -> Result<DrainStatus, AcquisitionError> {
        (**self).drain(buf)
    }

    fn signal(&self) -> DataReadySignal {
        (**self).signal()
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }

    fn overruns(&self) -> u64 {
        (**self).overruns()
    }
}

/// Reject configurations the converter cannot run.
pub fn check_capabilities(config: &AcquisitionConfig) -> Result<(), AcquisitionError> {
    let errors = config.capability_errors();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AcquisitionError::Unsupported(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_supported() {
        assert!(check_capabilities(&AcquisitionConfig::default()).is_ok());
    }

    #[test]
    fn test_unsupported_rate_rejected() {
        let config = AcquisitionConfig {
            sample_rate_hz: 10,
            ..AcquisitionConfig::default()
        };
        match check_capabilities(&config) {
            Err(AcquisitionError::Unsupported(errors)) => {
                assert!(errors.iter().any(|e| e.contains("sample_rate_hz")));
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(AcquisitionError::Unavailable("busy bus".into()).is_transient());
        assert!(!AcquisitionError::Fault("dma".into()).is_transient());
        assert!(!AcquisitionError::DeviceBusy(1).is_transient());
    }
}
