use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use dex_snap::config::PipelineConfig;
use dex_snap::persist::types::PublishMode;
use dex_snap::pipeline::{Pipeline, PublishSummary, Step, StepReport};
use dex_snap::schema::{SnapshotDate, Venue};
use dex_snap::telemetry;

/// Daily perpetual-futures snapshots for drift, hyperliquid and dydx
#[derive(Parser)]
#[command(name = "dex-snap")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./dex-snap.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect every venue, combine and publish
    Run {
        #[arg(long)]
        date: Option<SnapshotDate>,
        #[arg(long, value_enum, default_value_t = PublishMode::Daily)]
        mode: PublishMode,
    },
    /// Collect one venue into a JSON artifact
    Collect {
        venue: Venue,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        date: Option<SnapshotDate>,
        /// Leave the symbol registry untouched
        #[arg(long)]
        no_registry: bool,
    },
    /// Merge venue artifacts into the combined CSV (and JSON)
    Combine {
        #[arg(long)]
        drift: PathBuf,
        #[arg(long)]
        hl: PathBuf,
        #[arg(long)]
        dydx: PathBuf,
        #[arg(long)]
        out_csv: PathBuf,
        #[arg(long)]
        out_json: Option<PathBuf>,
        #[arg(long)]
        date: SnapshotDate,
    },
    /// Copy a staging directory into data/latest, data/daily_snapshots and data/history
    Publish {
        #[arg(long)]
        staging: PathBuf,
        #[arg(long)]
        repo_root: Option<PathBuf>,
        #[arg(long)]
        date: SnapshotDate,
        #[arg(long, value_enum, default_value_t = PublishMode::Daily)]
        mode: PublishMode,
    },
}

fn finish(report: StepReport) -> ExitCode {
    println!("{report}");
    if report.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok(); // load .env

    telemetry::init_tracing("info");
    telemetry::init_metrics()?;

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let code = match cli.command {
        Commands::Run { date, mode } => {
            let pipeline = Pipeline::from_config(config)?;
            let date = date.unwrap_or_else(SnapshotDate::today_utc);
            let report = pipeline.run(date, mode).await;
            for step in &report.steps {
                println!("{step}");
            }
            ExitCode::SUCCESS
        }
        Commands::Collect { venue, out, date, no_registry } => {
            let pipeline = Pipeline::from_config(config)?;
            let date = date.unwrap_or_else(SnapshotDate::today_utc);
            let res = pipeline.collect(venue, &date, &out, !no_registry).await;
            finish(StepReport::from_result(Step::Collect(venue), res))
        }
        Commands::Combine { drift, hl, dydx, out_csv, out_json, date } => {
            let pipeline = Pipeline::from_config(config)?;
            let artifacts = [(Venue::Drift, drift), (Venue::Hyperliquid, hl), (Venue::Dydx, dydx)];
            let res = pipeline.combine(&artifacts, &date, &out_csv, out_json.as_deref());
            finish(StepReport::from_result(Step::Combine, res))
        }
        Commands::Publish { staging, repo_root, date, mode } => {
            if let Some(root) = repo_root {
                config.repo_root = root;
            }
            let pipeline = Pipeline::from_config(config)?;
            let res = pipeline.publish(&staging, &date, mode).map(PublishSummary);
            finish(StepReport::from_result(Step::Publish, res))
        }
    };

    Ok(code)
}
