//! Frame source fed by the caller.
//!
//! Used by tests and by embedders that already own a converter driver: the
//! driver pushes completed frames through a [`FrameInjector`] and the
//! pipeline consumes them exactly as it would from the simulator.

use super::{
    encode_into, AcquisitionError, DataReadySignal, DrainStatus, FrameRing, FrameSource,
    RawEntry,
};

pub struct InjectedSource {
    name: String,
    ring: FrameRing,
}

impl InjectedSource {
    pub fn new(name: &str, frame_bytes: usize, store_frames: usize) -> Self {
        Self {
            name: name.to_string(),
            ring: FrameRing::new(frame_bytes, store_frames),
        }
    }

    /// Producer handle. Any number may exist; they share the same store.
    pub fn injector(&self) -> FrameInjector {
        FrameInjector {
            ring: self.ring.clone(),
        }
    }
}

impl FrameSource for InjectedSource {
    fn start(&mut self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    fn stop(&mut self) {
        self.ring.halt();
    }

    fn drain(&mut self, buf: &mut [u8]) -> Result<DrainStatus, AcquisitionError> {
        self.ring.drain(buf)
    }

    fn signal(&self) -> DataReadySignal {
        self.ring.signal()
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn overruns(&self) -> u64 {
        self.ring.overruns()
    }
}

/// Producer half of an [`InjectedSource`].
#[derive(Debug, Clone)]
pub struct FrameInjector {
    ring: FrameRing,
}

impl FrameInjector {
    /// Complete one frame of decoded entries. Returns the must-yield flag.
    pub fn push_entries(&self, items: &[RawEntry]) -> bool {
        self.ring.write_frame_with(|buf| encode_into(items, buf))
    }

    /// Complete one frame of raw bytes.
    pub fn push_bytes(&self, bytes: &[u8]) -> bool {
        self.ring.write_frame(bytes)
    }

    /// Make the next drain fail with a transient error.
    pub fn report_unavailable(&self, reason: &str) {
        self.ring.report(AcquisitionError::Unavailable(reason.to_string()));
    }

    /// Make the next drain fail fatally and stop the source.
    pub fn report_fault(&self, reason: &str) {
        self.ring.report(AcquisitionError::Fault(reason.to_string()));
    }

    /// No more frames will be pushed.
    pub fn finish(&self) {
        self.ring.halt();
    }

    pub fn overruns(&self) -> u64 {
        self.ring.overruns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::entries;

    #[test]
    fn test_pushed_entries_drain_in_order() {
        let mut source = InjectedSource::new("test", 16, 4);
        let injector = source.injector();
        injector.push_entries(&[RawEntry::new(6, 10), RawEntry::new(5, 20)]);
        injector.push_entries(&[RawEntry::new(6, 11)]);

        let mut buf = [0u8; 64];
        let DrainStatus::Read(n) = source.drain(&mut buf).unwrap() else {
            panic!("expected data");
        };
        let got: Vec<_> = entries(&buf[..n]).collect();
        assert_eq!(
            got,
            vec![RawEntry::new(6, 10), RawEntry::new(5, 20), RawEntry::new(6, 11)]
        );
    }

    #[test]
    fn test_fault_stops_source() {
        let mut source = InjectedSource::new("test", 16, 4);
        source.injector().report_fault("dma descriptor error");

        let mut buf = [0u8; 16];
        let err = source.drain(&mut buf).unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(source.drain(&mut buf).unwrap(), DrainStatus::Stopped);
    }
}
