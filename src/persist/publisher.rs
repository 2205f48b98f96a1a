use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::persist::artifact::{copy_atomic, ensure_dir};
use crate::persist::history::{read_csv_rows, HistoryStore};
use crate::persist::types::{AppendSummary, PersistResult, PublishMode};
use crate::schema::{SnapshotDate, Venue};

pub const COMBINED_CSV: &str = "all_latest.csv";
pub const COMBINED_JSON: &str = "all_latest.json";

/// Where a publish run put things.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub latest: Vec<PathBuf>,
    pub archived: Vec<PathBuf>,
    pub history: Option<AppendSummary>,
}

/// Distributes a staging directory into `data/latest`, `data/daily_snapshots` and
/// `data/history` under the repository root.
pub struct Publisher {
    repo_root: PathBuf,
}

impl Publisher {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self { repo_root: repo_root.into() }
    }

    pub fn latest_dir(&self) -> PathBuf {
        self.repo_root.join("data").join("latest")
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.repo_root.join("data").join("daily_snapshots")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.repo_root.join("data").join("history")
    }

    /// Artifacts refreshed on every run, in staging-name form.
    fn latest_names() -> Vec<String> {
        let mut names: Vec<String> = Venue::ALL.iter().map(|v| v.artifact_name()).collect();
        names.push(COMBINED_CSV.to_string());
        names.push(COMBINED_JSON.to_string());
        names
    }

    /// Staging name -> dated archive name. The combined JSON is not archived.
    fn archive_names(date: &SnapshotDate) -> Vec<(String, String)> {
        let ymd = date.compact();
        let mut pairs: Vec<(String, String)> = Venue::ALL
            .iter()
            .map(|v| (v.artifact_name(), format!("{}_{ymd}.json", v.as_str())))
            .collect();
        pairs.push((COMBINED_CSV.to_string(), format!("all_{ymd}.csv")));
        pairs
    }

    #[instrument(skip(self, staging), fields(staging = %staging.display()))]
    pub fn publish(
        &self,
        staging: &Path,
        date: &SnapshotDate,
        mode: PublishMode,
    ) -> PersistResult<PublishReport> {
        let mut report = PublishReport::default();

        let latest_dir = self.latest_dir();
        ensure_dir(&latest_dir)?;
        for name in Self::latest_names() {
            let src = staging.join(&name);
            if !src.exists() {
                debug!(artifact = %name, "not staged, latest copy left as is");
                continue;
            }
            let dst = latest_dir.join(&name);
            copy_atomic(&src, &dst)?;
            report.latest.push(dst);
        }

        if mode == PublishMode::Latest {
            info!(files = report.latest.len(), "latest-only publish done");
            return Ok(report);
        }

        let daily_dir = self.daily_dir();
        ensure_dir(&daily_dir)?;
        for (src_name, dst_name) in Self::archive_names(date) {
            let src = staging.join(&src_name);
            if !src.exists() {
                continue;
            }
            let dst = daily_dir.join(dst_name);
            copy_atomic(&src, &dst)?;
            report.archived.push(dst);
        }

        let combined = staging.join(COMBINED_CSV);
        if combined.exists() {
            let rows = read_csv_rows(&combined)?;
            let store = HistoryStore::new(self.history_dir());
            report.history = Some(store.append(date, &rows)?);
        } else {
            warn!(path = %combined.display(), "no combined CSV staged, history not updated");
        }

        info!(
            latest = report.latest.len(),
            archived = report.archived.len(),
            appended = report.history.map(|h| h.appended).unwrap_or(0),
            "daily publish done"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CSV: &str = "exchange,market_type,symbol_raw,leverage_max,price_usd,volume_24h_usd,open_interest_base,open_interest_usd,daily_snapshot\n\
dydx,CROSS,SOL-USD,20,150.0,10.0,3.0,450.0,2025-08-20\n";

    fn stage(dir: &Path) {
        fs::write(dir.join(COMBINED_CSV), CSV).unwrap();
        fs::write(dir.join(COMBINED_JSON), "[]").unwrap();
        fs::write(dir.join("dydx_latest.json"), "[]").unwrap();
    }

    fn date() -> SnapshotDate {
        SnapshotDate::parse("2025-08-20").unwrap()
    }

    #[test]
    fn test_latest_mode_only_touches_latest() {
        let staging = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        stage(staging.path());

        let publisher = Publisher::new(repo.path());
        let report = publisher.publish(staging.path(), &date(), PublishMode::Latest).unwrap();
        assert_eq!(report.latest.len(), 3);
        assert!(report.archived.is_empty());
        assert!(report.history.is_none());
        assert!(publisher.latest_dir().join(COMBINED_CSV).exists());
        assert!(!publisher.daily_dir().exists());
        assert!(!publisher.history_dir().exists());
    }

    #[test]
    fn test_daily_mode_archives_and_appends() {
        let staging = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        stage(staging.path());

        let publisher = Publisher::new(repo.path());
        let report = publisher.publish(staging.path(), &date(), PublishMode::Daily).unwrap();
        assert!(publisher.daily_dir().join("all_20250820.csv").exists());
        assert!(publisher.daily_dir().join("dydx_20250820.json").exists());
        assert!(!publisher.daily_dir().join("drift_20250820.json").exists());
        assert_eq!(report.archived.len(), 2);
        assert_eq!(report.history, Some(AppendSummary { appended: 1, skipped: 0 }));
        assert_eq!(
            fs::read_to_string(publisher.daily_dir().join("all_20250820.csv")).unwrap(),
            CSV
        );
    }

    #[test]
    fn test_republish_same_date_keeps_single_ledger_entry() {
        let staging = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        stage(staging.path());

        let publisher = Publisher::new(repo.path());
        publisher.publish(staging.path(), &date(), PublishMode::Daily).unwrap();
        let report = publisher.publish(staging.path(), &date(), PublishMode::Daily).unwrap();
        assert_eq!(report.history, Some(AppendSummary { appended: 0, skipped: 1 }));

        let ledger = publisher.history_dir().join("metrics_2025.csv");
        let rows = read_csv_rows(&ledger).unwrap();
        let hits = rows
            .iter()
            .filter(|r| r.daily_snapshot == "2025-08-20" && r.exchange == "dydx" && r.symbol_raw == "SOL-USD")
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_latest_is_last_write_wins() {
        let staging = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        stage(staging.path());
        let publisher = Publisher::new(repo.path());
        publisher.publish(staging.path(), &date(), PublishMode::Latest).unwrap();

        fs::write(staging.path().join(COMBINED_JSON), "[{}]").unwrap();
        publisher.publish(staging.path(), &date(), PublishMode::Latest).unwrap();
        assert_eq!(
            fs::read_to_string(publisher.latest_dir().join(COMBINED_JSON)).unwrap(),
            "[{}]"
        );
    }
}
