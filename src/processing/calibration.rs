//! Raw code to physical unit conversion.
//!
//! The core treats calibration as an opaque, pure function of
//! `(raw code, channel)`. Anything that can fail is checked when the
//! calibration is built, never per sample.

use crate::config::AcquisitionConfig;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Channel {channel}: scale {scale} mV/code is not usable")]
    InvalidScale { channel: u8, scale: f64 },

    #[error("Channel {channel}: offset {offset} mV is not finite")]
    InvalidOffset { channel: u8, offset: f64 },
}

/// Pure, deterministic raw-to-physical conversion.
pub trait Calibration: Send + Sync {
    fn to_physical(&self, raw: u16, channel: u8) -> f64;
}

impl<F> Calibration for F
where
    F: Fn(u16, u8) -> f64 + Send + Sync,
{
    fn to_physical(&self, raw: u16, channel: u8) -> f64 {
        self(raw, channel)
    }
}

/// `mV = raw * scale + offset`, per channel.
///
/// Channels without an explicit scale map full-scale code to the
/// attenuation's nominal full-scale input. Unknown channels pass the raw
/// code through unchanged.
#[derive(Debug, Clone)]
pub struct LinearCalibration {
    coefficients: HashMap<u8, (f64, f64)>,
}

impl LinearCalibration {
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, CalibrationError> {
        let default_scale = config.attenuation.full_scale_mv() / f64::from(config.max_code().max(1));
        let mut coefficients = HashMap::with_capacity(config.channels.len());

        for ch in &config.channels {
            let scale = ch.scale_mv_per_code.unwrap_or(default_scale);
            if !scale.is_finite() || scale == 0.0 {
                return Err(CalibrationError::InvalidScale { channel: ch.id, scale });
            }
            if !ch.offset_mv.is_finite() {
                return Err(CalibrationError::InvalidOffset {
                    channel: ch.id,
                    offset: ch.offset_mv,
                });
            }
            coefficients.insert(ch.id, (scale, ch.offset_mv));
        }

        Ok(Self { coefficients })
    }
}

impl Calibration for LinearCalibration {
    fn to_physical(&self, raw: u16, channel: u8) -> f64 {
        match self.coefficients.get(&channel) {
            Some(&(scale, offset)) => f64::from(raw) * scale + offset,
            None => f64::from(raw),
        }
    }
}
