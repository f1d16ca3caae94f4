//! Bounded frame store between the converter and the acquisition task.
//!
//! The producer side completes whole frames and raises the data-ready
//! signal once per frame. When the store is full the oldest frame is
//! overwritten and counted as an overrun, the way a DMA ring behaves when
//! the consumer falls behind. Drained frame buffers are recycled.

use super::{AcquisitionError, DataReadySignal, DrainStatus, ENTRY_BYTES};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle; clones refer to the same store.
#[derive(Debug, Clone)]
pub struct FrameRing {
    inner: Arc<RingInner>,
}

#[derive(Debug)]
struct RingInner {
    state: Mutex<RingState>,
    frame_bytes: usize,
    capacity: usize,
    signal: DataReadySignal,
    halted: AtomicBool,
    frames_written: AtomicU64,
    overruns: AtomicU64,
}

#[derive(Debug, Default)]
struct RingState {
    frames: VecDeque<Vec<u8>>,
    /// Read offset into the front frame
    cursor: usize,
    spare: Vec<Vec<u8>>,
    fault: Option<AcquisitionError>,
}

impl FrameRing {
    /// Store of `capacity` frames of `frame_bytes` each.
    pub fn new(frame_bytes: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RingInner {
                state: Mutex::new(RingState {
                    frames: VecDeque::with_capacity(capacity),
                    ..RingState::default()
                }),
                frame_bytes,
                capacity,
                signal: DataReadySignal::new(),
                halted: AtomicBool::new(false),
                frames_written: AtomicU64::new(0),
                overruns: AtomicU64::new(0),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RingState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn signal(&self) -> DataReadySignal {
        self.inner.signal.clone()
    }

    pub fn frame_bytes(&self) -> usize {
        self.inner.frame_bytes
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Complete one frame by filling a recycled buffer.
    ///
    /// Bytes past the last whole entry are discarded. Returns the signal's
    /// must-yield flag, or `false` when the ring is halted and the frame was
    /// ignored.
    pub fn write_frame_with<F>(&self, fill: F) -> bool
    where
        F: FnOnce(&mut Vec<u8>),
    {
        if self.is_halted() {
            return false;
        }

        let mut buf = self
            .state()
            .spare
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.inner.frame_bytes));
        buf.clear();
        fill(&mut buf);
        buf.truncate(buf.len() / ENTRY_BYTES * ENTRY_BYTES);
        if buf.is_empty() {
            return false;
        }

        {
            let mut state = self.state();
            if state.frames.len() >= self.inner.capacity {
                if let Some(old) = state.frames.pop_front() {
                    state.spare.push(old);
                }
                state.cursor = 0;
                self.inner.overruns.fetch_add(1, Ordering::Relaxed);
            }
            state.frames.push_back(buf);
        }
        self.inner.frames_written.fetch_add(1, Ordering::Relaxed);
        self.inner.signal.raise()
    }

    pub fn write_frame(&self, bytes: &[u8]) -> bool {
        self.write_frame_with(|buf| buf.extend_from_slice(bytes))
    }

    /// Report an error to be returned by the next drain. A fatal error also
    /// halts the ring.
    pub fn report(&self, error: AcquisitionError) {
        let fatal = !error.is_transient();
        self.state().fault = Some(error);
        if fatal {
            self.inner.halted.store(true, Ordering::Release);
        }
        self.inner.signal.raise();
    }

    /// Mark the converter as stopped. Buffered frames remain drainable and
    /// the consumer is woken so it can observe the stop.
    pub fn halt(&self) {
        self.inner.halted.store(true, Ordering::Release);
        self.inner.signal.raise();
    }

    pub fn is_halted(&self) -> bool {
        self.inner.halted.load(Ordering::Acquire)
    }

    /// Free frame slots before the next write would overwrite.
    pub fn free_frames(&self) -> usize {
        self.inner.capacity.saturating_sub(self.state().frames.len())
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Copy whole entries into `out`, at most `out.len()` bytes rounded
    /// down to the entry size. Never blocks on the producer.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let limit = out.len() / ENTRY_BYTES * ENTRY_BYTES;
        let mut written = 0;
        let mut state = self.state();

        while written < limit {
            let cursor = state.cursor;
            let Some(front) = state.frames.front() else {
                break;
            };
            let n = (front.len() - cursor).min(limit - written);
            out[written..written + n].copy_from_slice(&front[cursor..cursor + n]);
            written += n;

            if cursor + n >= front.len() {
                if let Some(done) = state.frames.pop_front() {
                    if state.spare.len() < self.inner.capacity {
                        state.spare.push(done);
                    }
                }
                state.cursor = 0;
            } else {
                state.cursor = cursor + n;
            }
        }
        written
    }

    /// Non-blocking drain with stop and fault reporting.
    pub fn drain(&self, out: &mut [u8]) -> Result<DrainStatus, AcquisitionError> {
        if let Some(fault) = self.state().fault.take() {
            return Err(fault);
        }
        match self.read(out) {
            0 if self.is_halted() => Ok(DrainStatus::Stopped),
            0 => Ok(DrainStatus::WouldBlock),
            n => Ok(DrainStatus::Read(n)),
        }
    }

    pub fn pending_bytes(&self) -> usize {
        let state = self.state();
        state.frames.iter().map(Vec::len).sum::<usize>() - state.cursor
    }

    pub fn frames_written(&self) -> u64 {
        self.inner.frames_written.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.inner.overruns.load(Ordering::Relaxed)
    }
}
