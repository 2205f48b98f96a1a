//! Per-year, append-only history ledger (`metrics_<YYYY>.csv`).
//!
//! An append scans the whole ledger for existing identity keys first, then writes only rows
//! whose key is new. Re-publishing the same date is therefore a no-op. There is no
//! cross-process locking: two runs for the same date must not overlap.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::persist::types::{AppendSummary, PersistError, PersistResult};
use crate::schema::{CanonicalRow, RowKey, SnapshotDate, CSV_FIELDS};

pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ledger_path(&self, date: &SnapshotDate) -> PathBuf {
        self.dir.join(format!("metrics_{}.csv", date.year()))
    }

    /// Identity keys already present in the ledger for `date`'s year.
    pub fn existing_keys(&self, date: &SnapshotDate) -> PersistResult<HashSet<RowKey>> {
        let path = self.ledger_path(date);
        if !path.exists() {
            return Ok(HashSet::new());
        }
        Ok(read_csv_rows(&path)?.iter().map(CanonicalRow::key).collect())
    }

    /// Append rows whose identity key is not yet recorded, in incoming order.
    #[instrument(skip(self, date, rows), fields(date = %date, incoming = rows.len()))]
    pub fn append(&self, date: &SnapshotDate, rows: &[CanonicalRow]) -> PersistResult<AppendSummary> {
        fs::create_dir_all(&self.dir).map_err(|e| PersistError::io(&self.dir, e))?;
        let path = self.ledger_path(date);
        // a zero-byte ledger still needs its header
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let mut seen = self.existing_keys(date)?;
        let fresh: Vec<&CanonicalRow> = rows.iter().filter(|r| seen.insert(r.key())).collect();
        let summary = AppendSummary { appended: fresh.len(), skipped: rows.len() - fresh.len() };

        if !is_new && fresh.is_empty() {
            debug!(path = %path.display(), skipped = summary.skipped, "nothing new for ledger");
            return Ok(summary);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PersistError::io(&path, e))?;
        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            w.write_record(CSV_FIELDS).map_err(|e| PersistError::csv(&path, e))?;
        }
        for row in &fresh {
            w.write_record(row.to_record()).map_err(|e| PersistError::csv(&path, e))?;
        }
        w.flush().map_err(|e| PersistError::io(&path, e))?;

        metrics::counter!("dex_snap_history_rows_appended_total").increment(summary.appended as u64);
        info!(
            path = %path.display(),
            appended = summary.appended,
            skipped = summary.skipped,
            "history ledger updated"
        );
        Ok(summary)
    }
}

/// Read a fixed-schema CSV (combined output or ledger) back into rows.
pub fn read_csv_rows(path: &Path) -> PersistResult<Vec<CanonicalRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PersistError::csv(path, e))?;
    let headers = rdr.headers().map_err(|e| PersistError::csv(path, e))?.clone();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| PersistError::csv(path, e))?;
        rows.push(CanonicalRow::from_record(&headers, &record));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MarketMetrics, Venue};

    fn date() -> SnapshotDate {
        SnapshotDate::parse("2025-08-20").unwrap()
    }

    fn row(venue: Venue, sym: &str, date: &SnapshotDate) -> CanonicalRow {
        let m = MarketMetrics { price_usd: Some(150.0), open_interest_base: Some(3.0), ..Default::default() };
        CanonicalRow::from_metrics(venue, sym, date, m)
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_first_append_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let s = store.append(&date(), &[row(Venue::Dydx, "SOL-USD", &date())]).unwrap();
        assert_eq!(s, AppendSummary { appended: 1, skipped: 0 });

        let path = store.ledger_path(&date());
        assert!(path.ends_with("metrics_2025.csv"));
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_FIELDS.join(","));
        assert_eq!(lines.next().unwrap(), "dydx,,SOL-USD,,150.0,,3.0,450.0,2025-08-20");
    }

    #[test]
    fn test_reappend_same_date_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let rows = vec![row(Venue::Dydx, "SOL-USD", &date()), row(Venue::Drift, "BTC-USD", &date())];
        store.append(&date(), &rows).unwrap();
        let before = line_count(&store.ledger_path(&date()));

        let s = store.append(&date(), &rows).unwrap();
        assert_eq!(s, AppendSummary { appended: 0, skipped: 2 });
        assert_eq!(line_count(&store.ledger_path(&date())), before);
    }

    #[test]
    fn test_key_match_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        store.append(&date(), &[row(Venue::Dydx, "SOL-USD", &date())]).unwrap();

        let mut shouty = row(Venue::Dydx, "SOL-USD", &date());
        shouty.exchange = "DYDX".into();
        shouty.symbol_raw = "sol-usd".into();
        let s = store.append(&date(), &[shouty]).unwrap();
        assert_eq!(s.appended, 0);
    }

    #[test]
    fn test_duplicates_within_batch_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let r = row(Venue::Drift, "ETH-USD", &date());
        let s = store.append(&date(), &[r.clone(), r]).unwrap();
        assert_eq!(s, AppendSummary { appended: 1, skipped: 1 });
    }

    #[test]
    fn test_new_date_same_year_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let next = SnapshotDate::parse("2025-08-21").unwrap();
        store.append(&date(), &[row(Venue::Dydx, "SOL-USD", &date())]).unwrap();
        store.append(&next, &[row(Venue::Dydx, "SOL-USD", &next)]).unwrap();

        let rows = read_csv_rows(&store.ledger_path(&date())).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].daily_snapshot, "2025-08-21");

        let other_year = SnapshotDate::parse("2026-01-01").unwrap();
        store.append(&other_year, &[row(Venue::Dydx, "SOL-USD", &other_year)]).unwrap();
        assert!(dir.path().join("metrics_2026.csv").exists());
        assert_eq!(read_csv_rows(&store.ledger_path(&date())).unwrap().len(), 2);
    }

    #[test]
    fn test_zero_byte_ledger_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let path = store.ledger_path(&date());
        fs::write(&path, "").unwrap();

        store.append(&date(), &[row(Venue::Dydx, "SOL-USD", &date())]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some(CSV_FIELDS.join(",").as_str()));

        let again = store.append(&date(), &[row(Venue::Dydx, "SOL-USD", &date())]).unwrap();
        assert_eq!(again, AppendSummary { appended: 0, skipped: 1 });
        assert_eq!(line_count(&path), 2);
    }

    #[test]
    fn test_empty_batch_still_creates_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        store.append(&date(), &[]).unwrap();
        assert_eq!(line_count(&store.ledger_path(&date())), 1);
    }
}
