//! neoGrid EM - acquisition node
//!
//! Samples the configured channels, reduces them to per-second AC RMS
//! statistics and POSTs one JSON payload per window.
//!
//! # Usage
//!
//! ```bash
//! # Simulated converter, default endpoint from config
//! cargo run --release
//!
//! # Replay a capture as fast as possible and log instead of POSTing
//! ./neogrid-em --replay capture.csv --speed 0 --dry-run
//!
//! # Local end-to-end run against the bundled sink
//! ./telemetry-sink --addr 127.0.0.1:8000 &
//! ./neogrid-em --endpoint http://127.0.0.1:8000 --duration 10
//! ```
//!
//! # Environment Variables
//!
//! - `NEOGRID_CONFIG`: Path to the TOML config (default: ./neogrid.toml)
//! - `NEOGRID_ENDPOINT`: Publisher endpoint override
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use neogrid_em::acquisition::{FrameSource, ReplaySource, SimulatedAdc};
use neogrid_em::config::MonitorConfig;
use neogrid_em::pipeline::{run_pipeline, LoopExit, PipelineReport};
use neogrid_em::processing::{Calibration, LinearCalibration};
use neogrid_em::publisher::{HttpPublisher, LogPublisher, Publisher};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "neogrid-em")]
#[command(about = "neoGrid EM acquisition node - AC RMS statistics telemetry")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Replay recorded conversions from a `channel,raw` CSV instead of the simulator
    #[arg(long, value_name = "CSV")]
    replay: Option<PathBuf>,

    /// Replay speed multiplier (1 = recorded rate, 0 = no delay)
    #[arg(long, default_value = "1")]
    speed: f64,

    /// Override publisher.endpoint
    #[arg(long, env = "NEOGRID_ENDPOINT")]
    endpoint: Option<String>,

    /// Log payloads instead of POSTing them
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let mut config =
        MonitorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(endpoint) = args.endpoint {
        config.publisher.endpoint = endpoint;
        config.validate().context("Invalid --endpoint")?;
    }

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  neoGrid EM acquisition node");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let labels: Vec<&str> = config.acquisition.channels.iter().map(|c| c.label.as_str()).collect();
    info!(
        "📐 Channels: {} @ {} Hz, {}-bit, window {} ms",
        labels.join(", "),
        config.acquisition.sample_rate_hz,
        config.acquisition.resolution_bits,
        config.window.duration_ms
    );

    let calibration: Arc<dyn Calibration> = Arc::new(
        LinearCalibration::from_config(&config.acquisition).context("Invalid calibration")?,
    );

    let source: Box<dyn FrameSource> = match &args.replay {
        Some(path) => {
            info!("📥 Input: replay {} (speed {}x)", path.display(), args.speed);
            Box::new(
                ReplaySource::from_file(path, &config.acquisition, args.speed)
                    .context("Failed to open replay file")?,
            )
        }
        None => {
            info!("📥 Input: simulated ADC unit {}", config.acquisition.unit);
            Box::new(
                SimulatedAdc::configure(&config.acquisition, &config.simulation)
                    .context("Failed to configure ADC")?,
            )
        }
    };

    let publisher: Box<dyn Publisher> = if args.dry_run || !config.publisher.enabled {
        info!("📤 Output: log only");
        Box::new(LogPublisher::new(&config.node))
    } else {
        info!("📤 Output: HTTP POST {}", config.publisher.endpoint);
        Box::new(
            HttpPublisher::new(&config.publisher, &config.node)
                .context("Failed to build HTTP client")?,
        )
    };

    // Graceful shutdown via Ctrl+C or --duration
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });
    if let Some(secs) = args.duration {
        let timer_token = cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("⏱️  Run duration of {}s reached, shutting down", secs);
            timer_token.cancel();
        });
    }

    let report = run_pipeline(&config, source, publisher, calibration, cancel_token).await?;
    log_summary(&report);

    if let LoopExit::Fault(reason) = &report.acquisition.exit {
        anyhow::bail!("Acquisition ended on a device fault: {reason}");
    }

    info!("✓ neoGrid EM shutdown complete");
    Ok(())
}

fn log_summary(report: &PipelineReport) {
    let a = &report.acquisition;
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 RUN SUMMARY");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Batches Processed:    {}", a.reducer.batches);
    info!("   Samples Accepted:     {}", a.reducer.samples_accepted);
    info!("   Samples Dropped:      {}", a.reducer.samples_dropped);
    info!("   RMS Values Dropped:   {}", a.aggregator.rms_dropped);
    info!("   Windows Closed:       {}", a.aggregator.windows_closed);
    info!("   Records Emitted:      {}", a.aggregator.records_emitted);
    info!("   Hand-off Drops:       {}", report.handoff.dropped);
    info!("   Records Published:    {}", report.publisher.published);
    info!("   Publish Failures:     {}", report.publisher.failed);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if a.overruns > 0 {
        warn!(overruns = a.overruns, "Frames were overwritten before they could be drained");
    }
    if a.reducer.unknown_entries > 0 {
        warn!(
            entries = a.reducer.unknown_entries,
            "Entries for unmonitored channels were discarded"
        );
    }
}
