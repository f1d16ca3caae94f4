//! Source Integration Tests
//!
//! Replay and simulated converters driven through the full pipeline.

use async_trait::async_trait;
use neogrid_em::acquisition::{ReplaySource, SimulatedAdc};
use neogrid_em::config::MonitorConfig;
use neogrid_em::pipeline::{run_pipeline, LoopExit};
use neogrid_em::processing::{Calibration, LinearCalibration};
use neogrid_em::publisher::{PublishError, Publisher};
use neogrid_em::StatsRecord;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<StatsRecord>>>);

#[async_trait]
impl Publisher for Capture {
    async fn publish(&mut self, record: &StatsRecord) -> Result<(), PublishError> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "capture"
    }
}

#[tokio::test]
async fn replay_file_runs_to_completion() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "channel,raw").unwrap();
    for i in 0..2000u32 {
        let code = if i % 4 < 2 { 1000 } else { 3000 };
        writeln!(file, "{},{}", if i % 2 == 0 { 6 } else { 5 }, code).unwrap();
    }

    let config = MonitorConfig::default();
    let source = ReplaySource::from_file(file.path(), &config.acquisition, 0.0).unwrap();
    let calibration: Arc<dyn Calibration> =
        Arc::new(LinearCalibration::from_config(&config.acquisition).unwrap());

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        run_pipeline(&config, source, Capture::default(), calibration, CancellationToken::new()),
    )
    .await
    .expect("replay did not finish")
    .unwrap();

    assert_eq!(report.acquisition.exit, LoopExit::SourceStopped);
    let accepted = report.acquisition.reducer.samples_accepted;
    let dropped = report.acquisition.reducer.samples_dropped;
    assert_eq!(accepted + dropped, 2000);
    assert_eq!(report.acquisition.overruns, 0);
}

#[tokio::test]
async fn simulated_adc_produces_sine_rms() {
    let mut config = MonitorConfig::default();
    config.acquisition.unit = 220;
    config.window.duration_ms = 100;
    config.simulation.noise_std_codes = 0.0;
    config.simulation.seed = Some(1);

    let source = SimulatedAdc::configure(&config.acquisition, &config.simulation).unwrap();
    let identity: Arc<dyn Calibration> = Arc::new(|raw: u16, _: u8| f64::from(raw));
    let capture = Capture::default();
    let cancel = CancellationToken::new();

    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(450)).await;
        timer.cancel();
    });
    let report = run_pipeline(&config, source, capture.clone(), identity, cancel)
        .await
        .unwrap();
    assert_eq!(report.acquisition.exit, LoopExit::Cancelled);

    let records = capture.0.lock().unwrap();
    assert!(!records.is_empty(), "expected at least one window");
    for record in records.iter() {
        // 1200-code sine: AC RMS close to 1200 / sqrt(2) over partial periods
        let v = record.channel("Voltage").unwrap().stats;
        assert!(v.has_data);
        assert!(v.avg > 600.0 && v.avg < 1000.0, "voltage rms avg {}", v.avg);
        let c = record.channel("Current").unwrap().stats;
        assert!(c.avg > 100.0 && c.avg < 300.0, "current rms avg {}", c.avg);
    }
}
