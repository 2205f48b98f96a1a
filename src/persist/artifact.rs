//! File-level helpers for run artifacts.
//!
//! Every write goes to a temp file in the destination directory and is renamed into place, so a
//! reader never sees a partially written artifact.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::trace;

use crate::persist::types::{PersistError, PersistResult};
use crate::schema::{CanonicalRow, SnapshotDate, Venue};

pub fn ensure_dir(path: &Path) -> PersistResult<()> {
    fs::create_dir_all(path).map_err(|e| PersistError::io(path, e))
}

/// Write `bytes` to `path` through a sibling temp file and an atomic rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> PersistResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp_")
        .tempfile_in(dir)
        .map_err(|e| PersistError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| PersistError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| PersistError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PersistError::io(path, e.error))?;

    trace!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

/// Indented JSON (two spaces), written atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> PersistResult<()> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| PersistError::json(path, e))?;
    atomic_write(path, &body)
}

/// Copy `src` over `dst` atomically. Last write wins.
pub fn copy_atomic(src: &Path, dst: &Path) -> PersistResult<()> {
    let bytes = fs::read(src).map_err(|e| PersistError::io(src, e))?;
    atomic_write(dst, &bytes)
}

/// Why an adapter artifact could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactProblem {
    Missing,
    Unreadable(String),
    Malformed(String),
    Empty,
}

impl std::fmt::Display for ArtifactProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactProblem::Missing => write!(f, "artifact missing"),
            ArtifactProblem::Unreadable(e) => write!(f, "artifact unreadable: {e}"),
            ArtifactProblem::Malformed(e) => write!(f, "artifact malformed: {e}"),
            ArtifactProblem::Empty => write!(f, "artifact has no rows"),
        }
    }
}

/// Parse an adapter artifact: a non-empty JSON array of row objects, each with a symbol.
/// Rows come back re-normalized for `venue` and `date`.
pub fn parse_rows(
    bytes: &[u8],
    venue: Venue,
    date: &SnapshotDate,
) -> Result<Vec<CanonicalRow>, ArtifactProblem> {
    let rows: Vec<CanonicalRow> =
        serde_json::from_slice(bytes).map_err(|e| ArtifactProblem::Malformed(e.to_string()))?;
    if rows.is_empty() {
        return Err(ArtifactProblem::Empty);
    }
    if let Some(i) = rows.iter().position(|r| r.symbol_raw.trim().is_empty()) {
        return Err(ArtifactProblem::Malformed(format!("row {i} has no symbol")));
    }
    Ok(rows.into_iter().map(|r| r.renormalized(venue, date)).collect())
}

pub fn read_rows(
    path: &Path,
    venue: Venue,
    date: &SnapshotDate,
) -> Result<Vec<CanonicalRow>, ArtifactProblem> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ArtifactProblem::Missing),
        Err(e) => return Err(ArtifactProblem::Unreadable(e.to_string())),
    };
    parse_rows(&bytes, venue, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> SnapshotDate {
        SnapshotDate::parse("2025-08-20").unwrap()
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");

        // no temp files left behind
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_read_rows_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift_latest.json");
        assert_eq!(read_rows(&path, Venue::Drift, &date()), Err(ArtifactProblem::Missing));

        fs::write(&path, "[]").unwrap();
        assert_eq!(read_rows(&path, Venue::Drift, &date()), Err(ArtifactProblem::Empty));

        fs::write(&path, r#"{"rows": []}"#).unwrap();
        assert!(matches!(
            read_rows(&path, Venue::Drift, &date()),
            Err(ArtifactProblem::Malformed(_))
        ));

        fs::write(&path, r#"[{"exchange":"drift","symbol_raw":"  "}]"#).unwrap();
        assert!(matches!(
            read_rows(&path, Venue::Drift, &date()),
            Err(ArtifactProblem::Malformed(_))
        ));
    }

    #[test]
    fn test_read_rows_renormalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift_latest.json");
        fs::write(&path, r#"[{"symbol_raw":"sol","price_usd":"150","open_interest_base":"10"}]"#)
            .unwrap();
        let rows = read_rows(&path, Venue::Drift, &date()).unwrap();
        assert_eq!(rows[0].exchange, "drift");
        assert_eq!(rows[0].symbol_raw, "SOL-USD");
        assert_eq!(rows[0].daily_snapshot, "2025-08-20");
        assert_eq!(rows[0].open_interest_usd, Some(1500.0));
    }
}
