//! neoGrid EM: mains voltage and current monitoring node
//!
//! Continuous ADC acquisition reduced to per-second statistics and shipped
//! as JSON telemetry.
//!
//! ## Architecture
//!
//! - **Acquisition**: continuous-mode converter sources (simulated, replayed,
//!   injected) writing frames into a bounded ring and raising a data-ready signal
//! - **Processing**: channel demultiplexing, calibration, per-batch AC RMS
//! - **Aggregation**: per-window min/max/avg/sd over the batch RMS values
//! - **Pipeline**: the acquisition task and the drop-newest hand-off
//! - **Publisher**: HTTP POST (or log) delivery of each window's record

pub mod acquisition;
pub mod aggregation;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod publisher;

pub use acquisition::{
    AcquisitionError, DataReadySignal, DrainStatus, FrameInjector, FrameSource, InjectedSource,
    RawEntry, ReplaySource, SimulatedAdc,
};
pub use aggregation::{ChannelWindow, StatsRecord, WindowAggregator, WindowStats};
pub use config::{ConfigError, MonitorConfig};
pub use pipeline::{run_pipeline, LoopExit, PipelineReport};
pub use processing::{ac_rms, BatchReducer, BatchRms, Calibration, LinearCalibration};
pub use publisher::{HttpPublisher, LogPublisher, PublishError, Publisher};
