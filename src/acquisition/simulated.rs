//! Simulated continuous-mode ADC.
//!
//! A dedicated thread stands in for the DMA engine: it produces one frame
//! per frame period, converting the configured channels round-robin from a
//! sine wave plus Gaussian noise, and raises the data-ready signal from
//! outside the async runtime exactly like a completion interrupt would.

use super::{
    check_capabilities, AcquisitionError, DataReadySignal, DeviceClaim, DrainStatus, FrameRing,
    FrameSource, RawEntry,
};
use crate::config::{AcquisitionConfig, SimulationConfig, WaveformConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ============================================================================
// Signal Generator
// ============================================================================

/// Produces raw entries following the conversion pattern.
///
/// Simulated time advances by one sample period after every full pass over
/// the pattern, so `sample_rate_hz` is the per-channel rate.
pub struct SignalGenerator {
    pattern: Vec<(u8, WaveformConfig)>,
    omega: f64,
    period: f64,
    dt: f64,
    t: f64,
    position: usize,
    noise: Option<Normal<f64>>,
    rng: StdRng,
    max_code: f64,
}

impl SignalGenerator {
    pub fn new(acq: &AcquisitionConfig, sim: &SimulationConfig) -> Self {
        let mid_scale = f64::from(acq.max_code() / 2 + 1);
        let pattern = acq
            .channels
            .iter()
            .enumerate()
            .map(|(i, ch)| {
                let wave = sim.waveforms.get(i).cloned().unwrap_or(WaveformConfig {
                    dc_code: mid_scale,
                    amplitude_code: 0.0,
                    phase_deg: 0.0,
                });
                (ch.id, wave)
            })
            .collect();

        let noise = (sim.noise_std_codes > 0.0)
            .then(|| Normal::new(0.0, sim.noise_std_codes).ok())
            .flatten();
        let rng = match sim.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            pattern,
            omega: TAU * sim.mains_frequency_hz,
            period: 1.0 / sim.mains_frequency_hz,
            dt: 1.0 / f64::from(acq.sample_rate_hz.max(1)),
            t: 0.0,
            position: 0,
            noise,
            rng,
            max_code: f64::from(acq.max_code()),
        }
    }

    pub fn next_entry(&mut self) -> RawEntry {
        let Some((channel, wave)) = self.pattern.get(self.position) else {
            return RawEntry::new(0, 0);
        };
        let mut value =
            wave.dc_code + wave.amplitude_code * (self.omega * self.t + wave.phase_deg.to_radians()).sin();
        if let Some(noise) = &self.noise {
            value += noise.sample(&mut self.rng);
        }
        let entry = RawEntry::new(*channel, value.round().clamp(0.0, self.max_code) as u16);

        self.position += 1;
        if self.position == self.pattern.len() {
            self.position = 0;
            self.t += self.dt;
            if self.t >= self.period {
                self.t -= self.period;
            }
        }
        entry
    }

    /// Append `count` encoded entries to `buf`.
    pub fn fill_frame(&mut self, buf: &mut Vec<u8>, count: usize) {
        for _ in 0..count {
            buf.extend_from_slice(&self.next_entry().encode());
        }
    }
}

// ============================================================================
// Simulated ADC
// ============================================================================

pub struct SimulatedAdc {
    ring: FrameRing,
    generator: Option<SignalGenerator>,
    entries_per_frame: usize,
    frame_period: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    _claim: DeviceClaim,
}

impl SimulatedAdc {
    /// Validate the configuration against the converter's capabilities and
    /// claim the ADC unit. Conversion does not begin until `start`.
    pub fn configure(
        acq: &AcquisitionConfig,
        sim: &SimulationConfig,
    ) -> Result<Self, AcquisitionError> {
        check_capabilities(acq)?;
        let claim = DeviceClaim::acquire(acq.unit)?;

        let entries_per_frame = acq.entries_per_frame();
        let conversions_per_sec = f64::from(acq.sample_rate_hz) * acq.channels.len() as f64;
        let frame_period = Duration::from_secs_f64(entries_per_frame as f64 / conversions_per_sec);

        debug!(
            unit = acq.unit,
            channels = acq.channels.len(),
            frame_period_ms = frame_period.as_secs_f64() * 1000.0,
            "Simulated ADC configured"
        );

        Ok(Self {
            ring: FrameRing::new(acq.frame_bytes, acq.store_frames()),
            generator: Some(SignalGenerator::new(acq, sim)),
            entries_per_frame,
            frame_period,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            _claim: claim,
        })
    }
}

impl FrameSource for SimulatedAdc {
    fn start(&mut self) -> Result<(), AcquisitionError> {
        let Some(mut generator) = self.generator.take() else {
            return Ok(());
        };

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let ring = self.ring.clone();
        let entries = self.entries_per_frame;
        let period = self.frame_period;

        let handle = std::thread::Builder::new()
            .name("adc-dma".to_string())
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                while running.load(Ordering::Acquire) {
                    ring.write_frame_with(|buf| generator.fill_frame(buf, entries));
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                    deadline += period;
                }
            })
            .map_err(|e| AcquisitionError::Fault(format!("failed to spawn DMA thread: {e}")))?;

        self.worker = Some(handle);
        info!(frame_period_ms = period.as_millis() as u64, "Simulated ADC started");
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.ring.halt();
    }

    fn drain(&mut self, buf: &mut [u8]) -> Result<DrainStatus, AcquisitionError> {
        self.ring.drain(buf)
    }

    fn signal(&self) -> DataReadySignal {
        self.ring.signal()
    }

    fn source_name(&self) -> &str {
        "simulated-adc"
    }

    fn overruns(&self) -> u64 {
        self.ring.overruns()
    }
}

impl Drop for SimulatedAdc {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        // The worker exits within one frame period; it is not joined so that
        // dropping from async context never blocks.
        self.worker.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::entries;
    use crate::config::ChannelConfig;

    fn flat_config(unit: u8) -> (AcquisitionConfig, SimulationConfig) {
        let acq = AcquisitionConfig {
            unit,
            channels: vec![ChannelConfig::new(6, "Voltage"), ChannelConfig::new(5, "Current")],
            ..AcquisitionConfig::default()
        };
        let sim = SimulationConfig {
            noise_std_codes: 0.0,
            seed: Some(7),
            waveforms: vec![
                WaveformConfig { dc_code: 1000.0, amplitude_code: 0.0, phase_deg: 0.0 },
                WaveformConfig { dc_code: 3000.0, amplitude_code: 0.0, phase_deg: 0.0 },
            ],
            ..SimulationConfig::default()
        };
        (acq, sim)
    }

    #[test]
    fn test_generator_follows_pattern() {
        let (acq, sim) = flat_config(0);
        let mut generator = SignalGenerator::new(&acq, &sim);
        let got: Vec<_> = (0..4).map(|_| generator.next_entry()).collect();
        assert_eq!(
            got,
            vec![
                RawEntry::new(6, 1000),
                RawEntry::new(5, 3000),
                RawEntry::new(6, 1000),
                RawEntry::new(5, 3000),
            ]
        );
    }

    #[test]
    fn test_generator_clamps_to_code_range() {
        let (acq, mut sim) = flat_config(0);
        sim.waveforms[0].dc_code = 9000.0;
        sim.waveforms[1].dc_code = -50.0;
        let mut generator = SignalGenerator::new(&acq, &sim);
        assert_eq!(generator.next_entry().code, 4095);
        assert_eq!(generator.next_entry().code, 0);
    }

    #[test]
    fn test_sine_swings_around_dc() {
        let (acq, mut sim) = flat_config(0);
        sim.waveforms[0].amplitude_code = 1000.0;
        let mut generator = SignalGenerator::new(&acq, &sim);
        let codes: Vec<u16> = (0..80)
            .map(|_| generator.next_entry())
            .filter(|e| e.channel == 6)
            .map(|e| e.code)
            .collect();
        assert!(codes.iter().any(|&c| c > 1900));
        assert!(codes.iter().any(|&c| c < 100));
    }

    #[test]
    fn test_unsupported_config_rejected_before_claim() {
        let (mut acq, sim) = flat_config(210);
        acq.resolution_bits = 16;
        assert!(matches!(
            SimulatedAdc::configure(&acq, &sim),
            Err(AcquisitionError::Unsupported(_))
        ));
        // The unit was never claimed
        let _claim = DeviceClaim::acquire(210).unwrap();
    }

    #[test]
    fn test_second_adc_on_same_unit_is_busy() {
        let (acq, sim) = flat_config(211);
        let _first = SimulatedAdc::configure(&acq, &sim).unwrap();
        assert!(matches!(
            SimulatedAdc::configure(&acq, &sim),
            Err(AcquisitionError::DeviceBusy(211))
        ));
    }

    #[tokio::test]
    async fn test_started_adc_produces_frames() {
        let (acq, sim) = flat_config(212);
        let mut adc = SimulatedAdc::configure(&acq, &sim).unwrap();
        let signal = adc.signal();
        adc.start().unwrap();

        tokio::time::timeout(Duration::from_secs(2), signal.wait())
            .await
            .expect("no frame within 2s");

        let mut buf = vec![0u8; acq.frame_bytes];
        let DrainStatus::Read(n) = adc.drain(&mut buf).unwrap() else {
            panic!("expected a frame after data-ready");
        };
        assert!(entries(&buf[..n]).all(|e| e.channel == 6 || e.channel == 5));
        adc.stop();
    }
}
