//! System-wide default constants.
//!
//! Stock node values, grouped by subsystem. Every field in [`MonitorConfig`](super::MonitorConfig) falls
//! back to one of these.

// ============================================================================
// Acquisition
// ============================================================================

/// ADC unit sampled by default.
pub const ADC_UNIT: u8 = 1;

/// Per-channel conversion rate (Hz).
pub const SAMPLE_RATE_HZ: u32 = 1_000;

/// Converter resolution (bits).
pub const RESOLUTION_BITS: u8 = 12;

/// Length of one hardware frame in bytes.
///
/// Also the maximum number of bytes a single `drain` call returns.
pub const FRAME_BYTES: usize = 256;

/// Size of the frame store behind the converter (bytes). 2048 = 8 frames.
pub const STORE_BUFFER_BYTES: usize = 2_048;

/// Maximum physical samples kept per channel within one batch.
pub const BATCH_SAMPLE_BUDGET: usize = 256;

/// Slowest conversion rate the converter supports (Hz).
pub const MIN_SAMPLE_RATE_HZ: u32 = 611;

/// Fastest conversion rate the converter supports (Hz).
pub const MAX_SAMPLE_RATE_HZ: u32 = 83_333;

/// Lowest supported resolution (bits).
pub const MIN_RESOLUTION_BITS: u8 = 9;

/// Highest supported resolution (bits).
pub const MAX_RESOLUTION_BITS: u8 = 13;

/// Maximum number of channels in one conversion pattern.
pub const MAX_CHANNELS: usize = 8;

/// Highest channel id representable in a raw entry (4-bit field).
pub const MAX_CHANNEL_ID: u8 = 15;

// ============================================================================
// Windowed aggregation
// ============================================================================

/// Statistics window length (milliseconds).
pub const WINDOW_DURATION_MS: u64 = 1_000;

/// Batch RMS values retained per channel per window.
///
/// At 1 kHz with 256-byte frames a channel produces ~31 batches per second,
/// so 200 only fills under a badly misconfigured rate.
pub const RMS_RING_CAPACITY: usize = 200;

// ============================================================================
// Hand-off
// ============================================================================

/// Statistics records buffered between the aggregator and the publisher.
pub const HANDOFF_QUEUE_CAPACITY: usize = 10;

// ============================================================================
// Publisher
// ============================================================================

/// Default telemetry endpoint (the bench receiver on the lab network).
pub const PUBLISHER_ENDPOINT: &str = "http://192.168.0.108:8000";

/// HTTP client timeout for one POST (seconds).
pub const PUBLISHER_TIMEOUT_SECS: u64 = 10;

/// Decimal places kept for every statistic in the JSON payload.
pub const PAYLOAD_DECIMALS: i32 = 3;

// ============================================================================
// Simulation
// ============================================================================

/// Mains frequency of the simulated signals (Hz).
pub const SIM_MAINS_FREQUENCY_HZ: f64 = 50.0;

/// Standard deviation of the Gaussian noise added to simulated codes.
pub const SIM_NOISE_STD_CODES: f64 = 2.0;

// ============================================================================
// Config search
// ============================================================================

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "NEOGRID_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "neogrid.toml";
