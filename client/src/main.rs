//! SwiftSense - Network Speed and WiFi Quality Client
//!
//! Runs an internet speed test (latency, download, upload) or a simulated
//! WiFi link check, keeps a short history and asks an AI service to explain
//! the numbers.

mod analysis;
#[cfg(feature = "png-charts")]
mod charts;
mod config;
mod link_hint;
mod output;
mod probe;
mod storage;

use anyhow::{Context, Result};
use clap::Parser;
use engine::service::{analyze_or_fallback, coverage_or_fallback};
use engine::{AnalysisSubject, CancelToken, Event, MeasureError, Orchestrator, ServiceError, TestPhase};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "swiftsense")]
#[command(version)]
#[command(about = "Internet speed and WiFi link quality tester", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "client.conf")]
    config: PathBuf,

    /// Estimate the local WiFi link instead of testing internet speed
    #[arg(long)]
    wifi: bool,

    /// Describe network coverage around --lat/--lng
    #[arg(long)]
    coverage: bool,

    /// Latitude for --coverage
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude for --coverage
    #[arg(long, allow_negative_numbers = true)]
    lng: Option<f64>,

    /// Print stored speed test history
    #[arg(long)]
    history: bool,

    /// Export stored history as CSV
    #[arg(long)]
    export: bool,

    /// Generate a PNG chart of stored history
    #[arg(long)]
    chart: bool,

    /// Output file for export/chart
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip AI analysis of the result
    #[arg(long)]
    no_analysis: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_found = args.config.exists();
    let config = if config_found {
        config::Config::load(&args.config)?
    } else {
        config::Config::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level()?.into()),
        )
        .init();

    info!("SwiftSense v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!("Loaded configuration from {:?}", args.config);
    } else {
        warn!("Config file {:?} not found, using defaults", args.config);
    }

    if args.history {
        run_history(&config)
    } else if args.export {
        info!("Export mode");
        run_export(&config, &args)
    } else if args.chart {
        info!("Chart generation mode");
        run_chart(&config, &args)
    } else if args.coverage {
        run_coverage(&config, &args).await
    } else if args.wifi {
        run_wifi(&config, &args).await
    } else {
        run_internet(&config, &args).await
    }
}

/// Cancel `token` on Ctrl+C
fn cancel_on_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling test");
            token.cancel();
        }
    });
}

fn analysis_enabled(config: &config::Config, args: &Args) -> bool {
    config.analysis.enabled && !args.no_analysis
}

async fn run_internet(config: &config::Config, args: &Args) -> Result<()> {
    let mut history = storage::open_history(&config.general)
        .context("Failed to open history storage")?;
    info!("{} previous results loaded", history.len());

    let transport = probe::NetworkTransport::new(config).await?;
    let mut orchestrator = Orchestrator::new(
        transport,
        None::<f64>,
        StdRng::from_entropy(),
        config.engine_settings(),
    );
    cancel_on_ctrl_c(orchestrator.cancel_token());

    println!("Starting speed test (Press Ctrl+C to stop)");
    let mut display = output::LiveDisplay::new(&config.output);
    let run = match orchestrator.run_internet(|event| display.handle(&event)).await {
        Ok(run) => run,
        Err(MeasureError::Cancelled) => {
            warn!("Speed test cancelled, nothing recorded");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if run.is_degraded() {
        warn!("Some phases failed; their values are reported as 0");
    }

    if let Err(e) = history.record(run.result) {
        error!("Failed to store result: {}", e);
    }

    output::print_speed_result(&run.result, config.output.use_colors);

    if analysis_enabled(config, args) {
        display.handle(&Event::Phase(TestPhase::Analyzing));
        let analyzer = analysis::GeminiAnalyzer::new(&config.analysis)?;
        let analysis = analyze_or_fallback(&analyzer, AnalysisSubject::Internet(&run.result)).await;
        output::print_analysis(&analysis, config.output.use_colors);
    }

    Ok(())
}

async fn run_wifi(config: &config::Config, args: &Args) -> Result<()> {
    let hint = link_hint::resolve(&config.link);
    let transport = probe::NetworkTransport::http_only(config)?;
    let mut orchestrator =
        Orchestrator::new(transport, hint, StdRng::from_entropy(), config.engine_settings());
    cancel_on_ctrl_c(orchestrator.cancel_token());

    let mut display = output::LiveDisplay::new(&config.output);
    let wifi = match orchestrator.run_wifi(|event| display.handle(&event)).await {
        Ok(wifi) => wifi,
        Err(MeasureError::Cancelled) => {
            warn!("WiFi check cancelled");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    output::print_wifi_result(&wifi, config.output.use_colors);

    if analysis_enabled(config, args) {
        display.handle(&Event::Phase(TestPhase::Analyzing));
        let analyzer = analysis::GeminiAnalyzer::new(&config.analysis)?;
        let analysis = analyze_or_fallback(&analyzer, AnalysisSubject::Wifi(&wifi)).await;
        output::print_analysis(&analysis, config.output.use_colors);
    }

    Ok(())
}

async fn run_coverage(config: &config::Config, args: &Args) -> Result<()> {
    let location = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) => {
            Ok((lat, lng))
        }
        (Some(lat), Some(lng)) => Err(ServiceError::PermissionDenied(format!(
            "coordinates {}, {} are out of range",
            lat, lng
        ))),
        _ => Err(ServiceError::PermissionDenied(
            "no location given, pass --lat and --lng".to_string(),
        )),
    };

    let analyzer = analysis::GeminiAnalyzer::new(&config.analysis)?;
    let report = coverage_or_fallback(&analyzer, location).await;
    output::print_coverage(&report, config.output.use_colors);

    Ok(())
}

fn run_history(config: &config::Config) -> Result<()> {
    let history = storage::open_history(&config.general)
        .context("Failed to open history storage")?;
    output::print_history(history.entries());
    Ok(())
}

fn run_export(config: &config::Config, args: &Args) -> Result<()> {
    let history = storage::open_history(&config.general)
        .context("Failed to open history storage")?;
    info!("Found {} results", history.len());

    let output_path = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(&config.export.export_directory).join(format!(
            "swiftsense_history_{}.csv",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    });

    output::export_csv(history.entries(), &output_path)?;

    info!("Exported to {:?}", output_path);

    Ok(())
}

#[cfg(feature = "png-charts")]
fn run_chart(config: &config::Config, args: &Args) -> Result<()> {
    let history = storage::open_history(&config.general)
        .context("Failed to open history storage")?;
    info!("Found {} results", history.len());

    if history.is_empty() {
        anyhow::bail!("No speed tests recorded yet");
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.export.export_directory).join("speed_history.png"));

    charts::generate_history_chart(history.entries(), &output_path, &config.export)?;

    info!("Chart saved to {:?}", output_path);

    Ok(())
}

#[cfg(not(feature = "png-charts"))]
fn run_chart(_config: &config::Config, _args: &Args) -> Result<()> {
    anyhow::bail!("This build has no chart support (rebuild with the png-charts feature)")
}
