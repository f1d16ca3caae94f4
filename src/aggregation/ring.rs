//! Fixed-capacity store of batch RMS values for the current window.

/// Drop-newest bounded buffer. Never grows past its capacity.
#[derive(Debug, Clone)]
pub struct RmsRing {
    values: Vec<f64>,
    capacity: usize,
    dropped: u64,
}

impl RmsRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append `value`, or count it as dropped when full.
    pub fn push(&mut self, value: f64) -> bool {
        if self.values.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values dropped since the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Empty the ring, keeping its allocation.
    pub fn reset(&mut self) {
        self.values.clear();
        self.dropped = 0;
    }
}
