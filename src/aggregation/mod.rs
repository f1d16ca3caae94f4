//! Window aggregation: per-channel RMS rings reduced to min/max/avg/sd once
//! per window, bundled into a [`StatsRecord`].

mod ring;
mod stats;
mod window;

pub use ring::RmsRing;
pub use stats::{ChannelWindow, StatsRecord, WindowStats};
pub use window::{AggregatorCounters, WindowAggregator};
