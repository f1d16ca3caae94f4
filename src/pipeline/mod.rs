//! Acquisition Pipeline Module
//!
//! ```text
//! converter ──frame──▶ FrameRing ──data-ready──▶ acquisition task
//!                                               │ drain ▸ demux ▸ batch RMS
//!                                               │ ▸ window aggregate
//!                                               ▼
//!                                       hand-off (bounded, drop newest)
//!                                               ▼
//!                                        publisher task
//! ```
//!
//! The acquisition task never waits on anything but the data-ready signal.
//! The hand-off is the only point the two tasks share.

mod acquisition_loop;
pub mod handoff;
mod runner;

pub use acquisition_loop::{AcquisitionLoop, AcquisitionSummary, LoopExit};
pub use handoff::{HandoffMonitor, HandoffReceiver, HandoffSender, HandoffStats, Offer};
pub use runner::{run_pipeline, PipelineReport};
