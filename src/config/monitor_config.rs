//! Monitor Configuration - acquisition, window, hand-off and publisher settings
//!
//! Each section implements `Default` with the stock node values, so an
//! empty file (or no file at all) reproduces the stock behaviour.

use super::defaults;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitoring node.
///
/// Load with [`MonitorConfig::load`], which searches:
/// 1. an explicit path (CLI `--config`)
/// 2. `$NEOGRID_CONFIG`
/// 3. `./neogrid.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Node identification, copied into every telemetry payload
    #[serde(default)]
    pub node: NodeConfig,

    /// Converter and channel layout
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Statistics window
    #[serde(default)]
    pub window: WindowConfig,

    /// Aggregator → publisher queue
    #[serde(default)]
    pub handoff: HandoffConfig,

    /// HTTP telemetry delivery
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Software signal generator used when no hardware is attached
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that exists but fails to read, parse or validate is a fatal
    /// error: the pipeline must not start on a half-understood config.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), node = %config.node.id, "Loaded monitor config from --config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), node = %config.node.id, "Loaded monitor config from NEOGRID_CONFIG");
                return Ok(config);
            }
            warn!(path = %path, "NEOGRID_CONFIG points to non-existent file, falling back");
        }

        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(node = %config.node.id, "Loaded monitor config from ./neogrid.toml");
            return Ok(config);
        }

        info!("No neogrid.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Two-pass: unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the effective config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every section against the converter's capabilities and the
    /// pipeline's sizing rules. All problems are reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.acquisition.capability_errors();
        let a = &self.acquisition;

        if a.frame_bytes == 0 || a.frame_bytes % crate::acquisition::ENTRY_BYTES != 0 {
            errors.push(format!(
                "acquisition.frame_bytes = {} must be a positive multiple of {}",
                a.frame_bytes,
                crate::acquisition::ENTRY_BYTES
            ));
        }
        if a.store_buffer_bytes < a.frame_bytes {
            errors.push(format!(
                "acquisition.store_buffer_bytes = {} must hold at least one frame ({} bytes)",
                a.store_buffer_bytes, a.frame_bytes
            ));
        }
        if a.batch_sample_budget == 0 {
            errors.push("acquisition.batch_sample_budget must be > 0".to_string());
        }

        for ch in &a.channels {
            if ch.label.trim().is_empty() {
                errors.push(format!("acquisition.channels[id={}].label must not be empty", ch.id));
            }
            if let Some(scale) = ch.scale_mv_per_code {
                if !scale.is_finite() || scale == 0.0 {
                    errors.push(format!(
                        "acquisition.channels[id={}].scale_mv_per_code = {} must be finite and non-zero",
                        ch.id, scale
                    ));
                }
            }
            if !ch.offset_mv.is_finite() {
                errors.push(format!(
                    "acquisition.channels[id={}].offset_mv must be finite",
                    ch.id
                ));
            }
        }

        let mut labels = HashSet::new();
        for ch in &a.channels {
            if !labels.insert(ch.label.as_str()) {
                errors.push(format!("acquisition.channels label '{}' is used twice", ch.label));
            }
        }

        if self.window.duration_ms == 0 {
            errors.push("window.duration_ms must be > 0".to_string());
        }
        if self.window.rms_ring_capacity == 0 {
            errors.push("window.rms_ring_capacity must be > 0".to_string());
        }
        if self.handoff.queue_capacity == 0 {
            errors.push("handoff.queue_capacity must be > 0".to_string());
        }
        if self.publisher.enabled && self.publisher.endpoint.trim().is_empty() {
            errors.push("publisher.endpoint must be set when the publisher is enabled".to_string());
        }
        if self.publisher.timeout_secs == 0 {
            errors.push("publisher.timeout_secs must be > 0".to_string());
        }

        let s = &self.simulation;
        if !(s.mains_frequency_hz.is_finite() && s.mains_frequency_hz > 0.0) {
            errors.push(format!(
                "simulation.mains_frequency_hz = {} must be > 0",
                s.mains_frequency_hz
            ));
        }
        if !(s.noise_std_codes.is_finite() && s.noise_std_codes >= 0.0) {
            errors.push(format!(
                "simulation.noise_std_codes = {} must be >= 0",
                s.noise_std_codes
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// Identification fields stamped on every telemetry payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identifier reported as `nodeId`
    #[serde(default)]
    pub id: String,

    /// Log level tag reported as `level`
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            level: default_level(),
        }
    }
}

// ============================================================================
// Acquisition
// ============================================================================

/// Input attenuation applied ahead of the converter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attenuation {
    #[serde(rename = "0db")]
    Db0,
    #[serde(rename = "2.5db")]
    Db2_5,
    #[serde(rename = "6db")]
    Db6,
    #[default]
    #[serde(rename = "11db")]
    Db11,
}

impl Attenuation {
    /// Nominal input voltage at full-scale code (millivolts).
    pub const fn full_scale_mv(self) -> f64 {
        match self {
            Self::Db0 => 950.0,
            Self::Db2_5 => 1_250.0,
            Self::Db6 => 1_750.0,
            Self::Db11 => 3_100.0,
        }
    }
}

/// One entry of the conversion pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Converter channel id as it appears in raw entries (0-15)
    pub id: u8,

    /// Quantity name, used as the JSON field prefix (`Voltage_min`, ...)
    pub label: String,

    /// Millivolts per raw code. `None` derives it from attenuation and resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_mv_per_code: Option<f64>,

    /// Offset added after scaling (millivolts)
    #[serde(default)]
    pub offset_mv: f64,
}

impl ChannelConfig {
    pub fn new(id: u8, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            scale_mv_per_code: None,
            offset_mv: 0.0,
        }
    }
}

fn default_channels() -> Vec<ChannelConfig> {
    vec![ChannelConfig::new(6, "Voltage"), ChannelConfig::new(5, "Current")]
}

/// Converter settings: what is sampled, how fast, and how frames are sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// ADC unit claimed by the hardware-backed sources
    #[serde(default = "default_unit")]
    pub unit: u8,

    /// Per-channel conversion rate (Hz)
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,

    /// Converter resolution (bits)
    #[serde(default = "default_resolution_bits")]
    pub resolution_bits: u8,

    /// Input attenuation
    #[serde(default)]
    pub attenuation: Attenuation,

    /// Bytes per hardware frame (and per drain call)
    #[serde(default = "default_frame_bytes")]
    pub frame_bytes: usize,

    /// Bytes of frame storage behind the converter
    #[serde(default = "default_store_buffer_bytes")]
    pub store_buffer_bytes: usize,

    /// Samples kept per channel per batch; the rest are counted and dropped
    #[serde(default = "default_batch_sample_budget")]
    pub batch_sample_budget: usize,

    /// Conversion pattern, in sampling order
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
}

fn default_unit() -> u8 {
    defaults::ADC_UNIT
}
fn default_sample_rate_hz() -> u32 {
    defaults::SAMPLE_RATE_HZ
}
fn default_resolution_bits() -> u8 {
    defaults::RESOLUTION_BITS
}
fn default_frame_bytes() -> usize {
    defaults::FRAME_BYTES
}
fn default_store_buffer_bytes() -> usize {
    defaults::STORE_BUFFER_BYTES
}
fn default_batch_sample_budget() -> usize {
    defaults::BATCH_SAMPLE_BUDGET
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            sample_rate_hz: default_sample_rate_hz(),
            resolution_bits: default_resolution_bits(),
            attenuation: Attenuation::default(),
            frame_bytes: default_frame_bytes(),
            store_buffer_bytes: default_store_buffer_bytes(),
            batch_sample_budget: default_batch_sample_budget(),
            channels: default_channels(),
        }
    }
}

impl AcquisitionConfig {
    /// Largest raw code at the configured resolution.
    pub fn max_code(&self) -> u16 {
        let bits = self.resolution_bits.min(16);
        ((1u32 << bits) - 1) as u16
    }

    /// Whole entries carried by one frame.
    pub fn entries_per_frame(&self) -> usize {
        self.frame_bytes / crate::acquisition::ENTRY_BYTES
    }

    /// Frames held by the store before the oldest is overwritten.
    pub fn store_frames(&self) -> usize {
        (self.store_buffer_bytes / self.frame_bytes.max(1)).max(1)
    }

    /// Problems the converter itself would refuse at configure time:
    /// channel count, channel ids, sample rate and resolution.
    pub fn capability_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.channels.is_empty() || self.channels.len() > defaults::MAX_CHANNELS {
            errors.push(format!(
                "acquisition.channels has {} entries, supported range is 1-{}",
                self.channels.len(),
                defaults::MAX_CHANNELS
            ));
        }

        let mut seen = HashSet::new();
        for ch in &self.channels {
            if ch.id > defaults::MAX_CHANNEL_ID {
                errors.push(format!(
                    "acquisition.channels id {} exceeds {}",
                    ch.id,
                    defaults::MAX_CHANNEL_ID
                ));
            }
            if !seen.insert(ch.id) {
                errors.push(format!("acquisition.channels id {} is listed twice", ch.id));
            }
        }

        if !(defaults::MIN_SAMPLE_RATE_HZ..=defaults::MAX_SAMPLE_RATE_HZ)
            .contains(&self.sample_rate_hz)
        {
            errors.push(format!(
                "acquisition.sample_rate_hz = {} is outside the supported range ({}-{} Hz)",
                self.sample_rate_hz,
                defaults::MIN_SAMPLE_RATE_HZ,
                defaults::MAX_SAMPLE_RATE_HZ
            ));
        }

        if !(defaults::MIN_RESOLUTION_BITS..=defaults::MAX_RESOLUTION_BITS)
            .contains(&self.resolution_bits)
        {
            errors.push(format!(
                "acquisition.resolution_bits = {} is outside the supported range ({}-{})",
                self.resolution_bits,
                defaults::MIN_RESOLUTION_BITS,
                defaults::MAX_RESOLUTION_BITS
            ));
        }

        errors
    }
}

// ============================================================================
// Window / Hand-off / Publisher
// ============================================================================

/// Statistics window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length (milliseconds)
    #[serde(default = "default_window_duration_ms")]
    pub duration_ms: u64,

    /// Batch RMS values kept per channel per window
    #[serde(default = "default_rms_ring_capacity")]
    pub rms_ring_capacity: usize,

    /// Emit a record even when no channel produced data in the window
    #[serde(default)]
    pub emit_empty_windows: bool,
}

fn default_window_duration_ms() -> u64 {
    defaults::WINDOW_DURATION_MS
}
fn default_rms_ring_capacity() -> usize {
    defaults::RMS_RING_CAPACITY
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_window_duration_ms(),
            rms_ring_capacity: default_rms_ring_capacity(),
            emit_empty_windows: false,
        }
    }
}

impl WindowConfig {
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.duration_ms)
    }
}

/// Aggregator → publisher queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Records buffered before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    defaults::HANDOFF_QUEUE_CAPACITY
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// HTTP telemetry delivery.
///
/// The endpoint can be overridden by the `--endpoint` CLI flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// POST target for statistics payloads
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// When false, records are logged instead of posted
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_endpoint() -> String {
    defaults::PUBLISHER_ENDPOINT.to_string()
}
fn default_timeout_secs() -> u64 {
    defaults::PUBLISHER_TIMEOUT_SECS
}
fn default_enabled() -> bool {
    true
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            enabled: default_enabled(),
        }
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Shape of one simulated channel, in raw codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformConfig {
    /// DC level (codes)
    #[serde(default)]
    pub dc_code: f64,

    /// Peak amplitude around the DC level (codes)
    #[serde(default)]
    pub amplitude_code: f64,

    /// Phase offset (degrees)
    #[serde(default)]
    pub phase_deg: f64,
}

fn default_waveforms() -> Vec<WaveformConfig> {
    vec![
        WaveformConfig {
            dc_code: 2048.0,
            amplitude_code: 1200.0,
            phase_deg: 0.0,
        },
        WaveformConfig {
            dc_code: 2048.0,
            amplitude_code: 300.0,
            phase_deg: -30.0,
        },
    ]
}

/// Software signal generator settings.
///
/// Waveforms are matched to `acquisition.channels` by position; channels
/// without a waveform read a flat mid-scale code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_mains_frequency_hz")]
    pub mains_frequency_hz: f64,

    #[serde(default = "default_noise_std_codes")]
    pub noise_std_codes: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default = "default_waveforms")]
    pub waveforms: Vec<WaveformConfig>,
}

fn default_mains_frequency_hz() -> f64 {
    defaults::SIM_MAINS_FREQUENCY_HZ
}
fn default_noise_std_codes() -> f64 {
    defaults::SIM_NOISE_STD_CODES
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mains_frequency_hz: default_mains_frequency_hz(),
            noise_std_codes: default_noise_std_codes(),
            seed: None,
            waveforms: default_waveforms(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors. All of them stop the pipeline before it starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n{}", bullet_list(.0))]
    Validation(Vec<String>),
}

fn bullet_list(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: MonitorConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.acquisition.sample_rate_hz, 1_000);
        assert_eq!(config.acquisition.frame_bytes, 256);
        assert_eq!(config.acquisition.channels.len(), 2);
        assert_eq!(config.acquisition.channels[0].label, "Voltage");
        assert_eq!(config.window.duration_ms, 1_000);
        assert_eq!(config.window.rms_ring_capacity, 200);
        assert_eq!(config.handoff.queue_capacity, 10);
        assert_eq!(config.node.level, "info");
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[node]
id = "feeder-3"

[acquisition]
sample_rate_hz = 2000
attenuation = "6db"

[[acquisition.channels]]
id = 3
label = "Voltage"
scale_mv_per_code = 0.5
"#;
        let config: MonitorConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.node.id, "feeder-3");
        assert_eq!(config.acquisition.sample_rate_hz, 2000);
        assert_eq!(config.acquisition.attenuation, Attenuation::Db6);
        assert_eq!(config.acquisition.channels.len(), 1);
        assert_eq!(config.acquisition.channels[0].scale_mv_per_code, Some(0.5));
        // Non-overridden values retain defaults
        assert_eq!(config.acquisition.resolution_bits, 12);
        assert_eq!(config.handoff.queue_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = MonitorConfig::default();
        config.acquisition.sample_rate_hz = 10;
        config.acquisition.resolution_bits = 16;
        config.window.rms_ring_capacity = 0;
        config.handoff.queue_capacity = 0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 4, "got: {errors:?}");
                assert!(errors.iter().any(|e| e.contains("sample_rate_hz")));
                assert!(errors.iter().any(|e| e.contains("resolution_bits")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_rejects_duplicate_channel_ids() {
        let mut config = MonitorConfig::default();
        config.acquisition.channels = vec![
            ChannelConfig::new(4, "Voltage"),
            ChannelConfig::new(4, "Current"),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_too_many_channels() {
        let mut config = MonitorConfig::default();
        config.acquisition.channels = (0..9)
            .map(|i| ChannelConfig::new(i, &format!("Ch{i}")))
            .collect();
        let errors = config.acquisition.capability_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("1-8"));
    }

    #[test]
    fn test_validation_rejects_misaligned_frame() {
        let mut config = MonitorConfig::default();
        config.acquisition.frame_bytes = 250;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_scale() {
        let mut config = MonitorConfig::default();
        config.acquisition.channels[0].scale_mv_per_code = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_geometry() {
        let a = AcquisitionConfig::default();
        assert_eq!(a.entries_per_frame(), 64);
        assert_eq!(a.store_frames(), 8);
        assert_eq!(a.max_code(), 4095);
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = MonitorConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: MonitorConfig =
            toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original.acquisition.channels, roundtripped.acquisition.channels);
        assert_eq!(original.acquisition.attenuation, roundtripped.acquisition.attenuation);
        assert_eq!(original.simulation.waveforms, roundtripped.simulation.waveforms);
    }
}
