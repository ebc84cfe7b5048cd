use alerter::thresholds::{self, MetricReadings, ThresholdRule};
use alerter::{AlertSink, build_alerter};
use anyhow::Context;
use api_client::{AnalyticsSource, Ga4Client};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use configuration::{Config, LogFormat, init_tracing, load_config};
use core_types::AlertKind;
use forecast_store::{FileStore, RetentionManager, SnapshotStore};
use pipeline::{
    DailyTrigger, ForecastPipeline, ForecastScheduler, PipelineSettings, SystemClock,
    TriggerOutcome,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use web_server::AppState;

/// The entry point for the forecast scheduler service.
#[tokio::main]
async fn main() -> ExitCode {
    // Load GA4 credentials and other secrets from the .env file, if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "Command failed.");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Generates a daily one-day-ahead forecast from GA4 analytics data.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to ./config.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the console log format from the configuration.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the startup smoke test, arm the daily schedule and serve the HTTP API.
    Serve(ServeArgs),
    /// Run a single forecast cycle and exit. The exit code reflects the outcome.
    RunOnce,
    /// List the retained forecast snapshots, newest first.
    List {
        /// Show at most this many snapshots.
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },
    /// Prune the snapshot store down to its configured cap.
    Prune {
        /// Keep this many snapshots instead of the configured cap.
        #[arg(long)]
        max: Option<usize>,
    },
    /// Fetch fresh analytics data and evaluate the alert thresholds.
    CheckAlerts {
        /// Print the triggered alerts without sending them.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Parser)]
struct ServeArgs {
    /// Address for the HTTP API. Overrides `server.addr`.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Arm the schedule without running the startup smoke test.
    #[arg(long)]
    skip_smoke_test: bool,
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    // Held until exit so buffered log lines reach the file.
    let _log_guard = init_tracing(&config.logging)?;

    match cli.command {
        Commands::Serve(args) => handle_serve(&config, args).await,
        Commands::RunOnce => handle_run_once(&config).await,
        Commands::List { limit } => handle_list(&config, limit).await,
        Commands::Prune { max } => handle_prune(&config, max).await,
        Commands::CheckAlerts { dry_run } => handle_check_alerts(&config, dry_run).await,
    }
}

// ==============================================================================
// Wiring
// ==============================================================================

async fn open_store(config: &Config) -> anyhow::Result<Arc<FileStore>> {
    let store = FileStore::open(&config.store.forecast_dir)
        .await
        .with_context(|| format!("Failed to open forecast store at {}", config.store.forecast_dir.display()))?;
    Ok(Arc::new(store))
}

async fn build_scheduler(config: &Config) -> anyhow::Result<ForecastScheduler> {
    let source = Arc::new(Ga4Client::new(&config.analytics, config.pipeline.timezone)?);
    let store = open_store(config).await?;
    let alerter = build_alerter(&config.alerts);

    let pipeline = ForecastPipeline::new(
        PipelineSettings::from_config(config),
        source,
        store,
        alerter,
        RetentionManager::new(config.store.max_snapshots),
    );
    Ok(ForecastScheduler::new(Arc::new(pipeline)))
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_serve(config: &Config, args: ServeArgs) -> anyhow::Result<ExitCode> {
    let scheduler = build_scheduler(config).await?;
    let trigger = DailyTrigger::new(
        config.pipeline.schedule_time()?,
        config.pipeline.timezone,
        Arc::new(SystemClock),
    );
    let smoke_test = config.pipeline.startup_smoke_test && !args.skip_smoke_test;

    tracing::info!(
        schedule_time = %config.pipeline.schedule_time,
        timezone = %config.pipeline.timezone,
        next_run = %trigger.next_run(),
        "Starting forecast scheduler."
    );

    let schedule = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(Box::new(trigger), smoke_test).await })
    };

    let addr = args.addr.unwrap_or(config.server.addr);
    let state = Arc::new(AppState { scheduler: scheduler.clone() });
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C.");
        }
        tracing::info!("Shutdown requested.");
    };

    web_server::run_server(addr, state, shutdown).await?;

    // Stop arming new cycles, but let a running one finish its write.
    schedule.abort();
    scheduler.wait_idle().await;
    tracing::info!("Forecast scheduler stopped.");
    Ok(ExitCode::SUCCESS)
}

async fn handle_run_once(config: &Config) -> anyhow::Result<ExitCode> {
    let scheduler = build_scheduler(config).await?;

    match scheduler.run_now().await {
        TriggerOutcome::Completed(Ok(success)) => {
            println!(
                "Forecast for {} saved to {} ({} conversions, {} sessions).",
                success.forecast.forecast_date,
                success.snapshot,
                success.forecast.predicted_conversions,
                success.forecast.predicted_sessions,
            );
            Ok(ExitCode::SUCCESS)
        }
        TriggerOutcome::Completed(Err(e)) => {
            eprintln!("Forecast cycle failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
        TriggerOutcome::Skipped => {
            eprintln!("A forecast cycle is already running.");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn handle_list(config: &Config, limit: usize) -> anyhow::Result<ExitCode> {
    let store = open_store(config).await?;
    let ids = store.list().await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Snapshot",
        "Forecast date",
        "Conversions",
        "Sessions",
        "Confidence",
        "Data points",
        "Generated at",
    ]);

    for id in ids.iter().rev().take(limit) {
        match store.read(id).await {
            Ok(forecast) => {
                table.add_row(vec![
                    Cell::new(id),
                    Cell::new(forecast.forecast_date),
                    Cell::new(format!("{:.2}", forecast.predicted_conversions)),
                    Cell::new(format!("{:.2}", forecast.predicted_sessions)),
                    Cell::new(forecast.confidence_level),
                    Cell::new(forecast.data_points_used),
                    Cell::new(forecast.generated_at.to_rfc3339()),
                ]);
            }
            Err(e) => {
                tracing::warn!(snapshot = %id, error = %e, "Skipping unreadable snapshot.");
            }
        }
    }

    println!("{table}");
    println!(
        "{} of {} snapshot(s) shown from {}.",
        ids.len().min(limit),
        ids.len(),
        config.store.forecast_dir.display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn handle_prune(config: &Config, max: Option<usize>) -> anyhow::Result<ExitCode> {
    let store = open_store(config).await?;
    let retention = RetentionManager::new(max.unwrap_or(config.store.max_snapshots));

    let report = retention.prune(&*store).await?;

    for id in &report.removed {
        println!("Removed {}", id);
    }
    for (id, reason) in &report.failed {
        eprintln!("Could not remove {}: {}", id, reason);
    }
    println!(
        "{} removed, {} failed, {} retained (cap {}).",
        report.removed.len(),
        report.failed.len(),
        report.retained,
        retention.max_count()
    );

    Ok(if report.failed.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn handle_check_alerts(config: &Config, dry_run: bool) -> anyhow::Result<ExitCode> {
    let client = Ga4Client::new(&config.analytics, config.pipeline.timezone)?;
    let snapshot = client
        .fetch_analytics(&config.analytics.property_id, config.analytics.lookback_days)
        .await
        .context("Failed to fetch analytics data")?;

    let today = snapshot.captured_at.with_timezone(&config.pipeline.timezone).date_naive();
    let readings = MetricReadings::from_snapshot(&snapshot, today);
    let rules = ThresholdRule::defaults(&config.alerts.thresholds);
    let triggered = thresholds::evaluate(&rules, &readings);

    if triggered.is_empty() {
        println!("All {} threshold rule(s) passed.", rules.len());
        return Ok(ExitCode::SUCCESS);
    }

    let sink = (!dry_run).then(|| build_alerter(&config.alerts));
    for alert in &triggered {
        println!("{}: {}", alert.subject(), alert.message);
        if let Some(sink) = &sink {
            if let Err(e) = sink
                .send_alert(AlertKind::ThresholdBreached, &alert.subject(), &alert.message)
                .await
            {
                tracing::warn!(alert = %alert.alert, error = %e, "Failed to deliver threshold alert.");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
