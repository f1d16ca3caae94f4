//! Exclusive ownership of an ADC unit.
//!
//! Only one source may drive a converter at a time. A claim is held for the
//! lifetime of the source and released on drop.

use super::AcquisitionError;
use std::sync::{Mutex, PoisonError};

static CLAIMED_UNITS: Mutex<Vec<u8>> = Mutex::new(Vec::new());

/// Guard over one claimed ADC unit.
#[derive(Debug)]
pub struct DeviceClaim {
    unit: u8,
}

impl DeviceClaim {
    /// Claim `unit`, failing with [`AcquisitionError::DeviceBusy`] if another
    /// source already holds it.
    pub fn acquire(unit: u8) -> Result<Self, AcquisitionError> {
        let mut claimed = CLAIMED_UNITS.lock().unwrap_or_else(PoisonError::into_inner);
        if claimed.contains(&unit) {
            return Err(AcquisitionError::DeviceBusy(unit));
        }
        claimed.push(unit);
        tracing::debug!(unit, "Claimed ADC unit");
        Ok(Self { unit })
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let mut claimed = CLAIMED_UNITS.lock().unwrap_or_else(PoisonError::into_inner);
        claimed.retain(|&u| u != self.unit);
        tracing::debug!(unit = self.unit, "Released ADC unit");
    }
}
