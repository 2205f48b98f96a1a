//! Sequential snapshot run: collect every venue, combine, publish.
//!
//! A failing step is logged, counted and reported; the steps after it still run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::market_data::adapters::{run_adapter, AdapterOutcome, DriftAdapter, DydxAdapter, HyperliquidAdapter};
use crate::market_data::combiner::{combine, load_artifact, resolve, RowSource};
use crate::market_data::transport::{HttpTransport, Transport};
use crate::persist::publisher::{PublishReport, Publisher, COMBINED_CSV, COMBINED_JSON};
use crate::persist::registry::{record_symbols, FileRegistry};
use crate::persist::types::PublishMode;
use crate::persist::SymbolRegistry;
use crate::schema::{SnapshotDate, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Collect(Venue),
    Combine,
    Publish,
}

impl Step {
    fn label(&self) -> &'static str {
        match self {
            Step::Collect(v) => v.as_str(),
            Step::Combine => "combine",
            Step::Publish => "publish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn from_result<T: fmt::Display>(step: Step, res: anyhow::Result<T>) -> Self {
        let outcome = match res {
            Ok(summary) => StepOutcome::Completed(summary.to_string()),
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(%step, error = %reason, "step failed, continuing");
                metrics::counter!("dex_snap_step_failures_total", "step" => step.label()).increment(1);
                StepOutcome::Failed(reason)
            }
        };
        Self { step, outcome }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed(_))
    }
}

/// One line per step: `[drift] rows=12 -> tmp/20250820/drift_latest.json`.
impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            StepOutcome::Completed(s) => write!(f, "[{}] {s}", self.step),
            StepOutcome::Failed(s) => write!(f, "[{}] WARN: {s}", self.step),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub date: SnapshotDate,
    pub staging: PathBuf,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.is_failed()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectSummary {
    pub venue: Venue,
    pub rows: usize,
    pub path: PathBuf,
    pub registry_size: Option<usize>,
}

impl fmt::Display for CollectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rows={} -> {}", self.rows, self.path.display())?;
        if let Some(n) = self.registry_size {
            write!(f, " (registry={n})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineSummary {
    pub rows: usize,
    pub placeholder_venues: Vec<Venue>,
    pub csv: PathBuf,
    pub json: Option<PathBuf>,
}

impl fmt::Display for CombineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rows={} -> {}", self.rows, self.csv.display())?;
        if let Some(json) = &self.json {
            write!(f, ", {}", json.display())?;
        }
        if !self.placeholder_venues.is_empty() {
            let names: Vec<&str> = self.placeholder_venues.iter().map(|v| v.as_str()).collect();
            write!(f, " (placeholders: {})", names.join(","))?;
        }
        Ok(())
    }
}

/// One-line form of a `PublishReport`.
pub struct PublishSummary(pub PublishReport);

impl fmt::Display for PublishSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        write!(f, "latest={} archived={}", r.latest.len(), r.archived.len())?;
        if let Some(h) = r.history {
            write!(f, " history appended={} skipped={}", h.appended, h.skipped)?;
        }
        Ok(())
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    transport: Box<dyn Transport>,
    registry: Box<dyn SymbolRegistry + Send + Sync>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        transport: Box<dyn Transport>,
        registry: Box<dyn SymbolRegistry + Send + Sync>,
    ) -> Self {
        Self { config, transport, registry }
    }

    /// HTTP transport and file registry, both taken from `config`.
    pub fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config.http).context("building HTTP transport")?;
        let registry = FileRegistry::new(config.registry_path());
        Ok(Self::new(config, Box::new(transport), Box::new(registry)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn staging_dir(&self, date: &SnapshotDate) -> PathBuf {
        self.config.staging_root.join(date.compact())
    }

    async fn fetch(&self, venue: Venue, date: &SnapshotDate) -> AdapterOutcome {
        let transport = self.transport.as_ref();
        let ep = &self.config.endpoints;
        match venue {
            Venue::Drift => {
                let adapter = DriftAdapter::new(&ep.drift_markets_url, self.config.http.drift_page_size);
                run_adapter(&adapter, transport, date).await
            }
            Venue::Hyperliquid => {
                run_adapter(&HyperliquidAdapter::new(&ep.hyperliquid_info_url), transport, date).await
            }
            Venue::Dydx => run_adapter(&DydxAdapter::new(&ep.dydx_indexer_url), transport, date).await,
        }
    }

    /// Collect one venue into `out`. On failure a stale artifact at `out` is removed so the
    /// combiner falls back to placeholders.
    #[instrument(skip_all, fields(%venue, %date))]
    pub async fn collect(
        &self,
        venue: Venue,
        date: &SnapshotDate,
        out: &Path,
        update_registry: bool,
    ) -> anyhow::Result<CollectSummary> {
        let rows = match self.fetch(venue, date).await {
            AdapterOutcome::Collected(rows) => rows,
            AdapterOutcome::Failed { reason } => {
                match fs::remove_file(out) {
                    Ok(()) => info!(path = %out.display(), "removed stale artifact"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %out.display(), error = %e, "could not remove stale artifact"),
                }
                bail!("{venue} collection failed: {reason}");
            }
        };

        crate::persist::artifact::write_json(out, &rows)?;
        let registry_size = if update_registry {
            let symbols = rows.iter().map(|r| r.symbol_raw.clone());
            Some(record_symbols(self.registry.as_ref(), venue, symbols)?)
        } else {
            None
        };

        Ok(CollectSummary { venue, rows: rows.len(), path: out.to_path_buf(), registry_size })
    }

    /// Combine venue artifacts (any of which may be missing) into CSV and optional JSON.
    #[instrument(skip_all, fields(%date))]
    pub fn combine(
        &self,
        artifacts: &[(Venue, PathBuf)],
        date: &SnapshotDate,
        out_csv: &Path,
        out_json: Option<&Path>,
    ) -> anyhow::Result<CombineSummary> {
        let parts = Venue::ALL
            .iter()
            .map(|&venue| {
                let outcome = match artifacts.iter().find(|(v, _)| *v == venue) {
                    Some((_, path)) => load_artifact(path, venue, date),
                    None => AdapterOutcome::Failed { reason: "no artifact given".into() },
                };
                resolve(venue, outcome, self.registry.as_ref(), date)
                    .with_context(|| format!("reading {venue} symbol registry"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let placeholder_venues = parts
            .iter()
            .filter(|p| p.source == RowSource::Placeholder)
            .map(|p| p.venue)
            .collect();

        let table = combine(parts);
        table.write_csv(out_csv)?;
        if let Some(path) = out_json {
            table.write_json(path)?;
        }
        Ok(CombineSummary {
            rows: table.len(),
            placeholder_venues,
            csv: out_csv.to_path_buf(),
            json: out_json.map(Path::to_path_buf),
        })
    }

    pub fn publish(&self, staging: &Path, date: &SnapshotDate, mode: PublishMode) -> anyhow::Result<PublishReport> {
        let publisher = Publisher::new(&self.config.repo_root);
        let report = publisher
            .publish(staging, date, mode)
            .with_context(|| format!("publishing {}", staging.display()))?;
        Ok(report)
    }

    /// Full run into `staging_root/YYYYMMDD`.
    #[instrument(skip_all, fields(%date, %mode))]
    pub async fn run(&self, date: SnapshotDate, mode: PublishMode) -> RunReport {
        let staging = self.staging_dir(&date);
        let mut steps = Vec::new();

        for venue in Venue::ALL {
            let out = staging.join(venue.artifact_name());
            let res = self.collect(venue, &date, &out, true).await;
            steps.push(StepReport::from_result(Step::Collect(venue), res));
        }

        let artifacts: Vec<(Venue, PathBuf)> =
            Venue::ALL.iter().map(|v| (*v, staging.join(v.artifact_name()))).collect();
        let csv = staging.join(COMBINED_CSV);
        let json = staging.join(COMBINED_JSON);
        let res = self.combine(&artifacts, &date, &csv, Some(&json));
        steps.push(StepReport::from_result(Step::Combine, res));

        let res = self.publish(&staging, &date, mode).map(PublishSummary);
        steps.push(StepReport::from_result(Step::Publish, res));

        let report = RunReport { date, staging, steps };
        info!(failures = report.failures(), "run finished");
        report
    }
}
