//! Signal processing: calibration and per-batch AC-RMS reduction.

mod batch;
mod calibration;

pub use batch::{ac_rms, BatchReducer, BatchRms, ChannelRms, ReducerCounters};
pub use calibration::{Calibration, CalibrationError, LinearCalibration};
