//! Merges the per-venue row sets into the combined table.
//!
//! Each venue contributes either the rows its adapter collected or, when there are none,
//! placeholder rows for its registered symbols. The table is ordered by (exchange, symbol)
//! with a stable sort over the fixed venue concatenation order.

use std::path::Path;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::market_data::adapters::AdapterOutcome;
use crate::market_data::placeholders::placeholders;
use crate::persist::artifact::{atomic_write, read_rows, write_json};
use crate::persist::types::{PersistError, PersistResult};
use crate::persist::SymbolRegistry;
use crate::schema::{CanonicalRow, SnapshotDate, Venue, CSV_FIELDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    Collected,
    Placeholder,
}

/// The rows one venue contributes to the table.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueRows {
    pub venue: Venue,
    pub source: RowSource,
    pub rows: Vec<CanonicalRow>,
}

/// Pick collected rows when there are any, otherwise synthesize placeholders from the registry.
///
/// Fails only when the fallback is needed and the registry cannot be read.
pub fn resolve<R: SymbolRegistry + ?Sized>(
    venue: Venue,
    outcome: AdapterOutcome,
    registry: &R,
    date: &SnapshotDate,
) -> PersistResult<VenueRows> {
    let reason = match outcome {
        AdapterOutcome::Collected(rows) if !rows.is_empty() => {
            return Ok(VenueRows { venue, source: RowSource::Collected, rows });
        }
        AdapterOutcome::Failed { reason } => reason,
        AdapterOutcome::Collected(_) => "no rows collected".to_string(),
    };
    let symbols = registry.read(venue)?;
    warn!(%venue, %reason, symbols = symbols.len(), "using placeholder rows");
    Ok(VenueRows { venue, source: RowSource::Placeholder, rows: placeholders(venue, &symbols, date) })
}

/// Read an adapter artifact back into an outcome. Any problem with the file is a failure.
pub fn load_artifact(path: &Path, venue: Venue, date: &SnapshotDate) -> AdapterOutcome {
    match read_rows(path, venue, date) {
        Ok(rows) => {
            debug!(%venue, path = %path.display(), rows = rows.len(), "artifact loaded");
            AdapterOutcome::Collected(rows)
        }
        Err(problem) => AdapterOutcome::Failed { reason: format!("{}: {problem}", path.display()) },
    }
}

/// The ordered, combined snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedTable {
    pub rows: Vec<CanonicalRow>,
}

impl CombinedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CSV with the fixed header; extra attributes are dropped.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut w = csv::Writer::from_writer(Vec::new());
        w.write_record(CSV_FIELDS)?;
        for row in &self.rows {
            w.write_record(row.to_record())?;
        }
        w.into_inner().map_err(|e| csv::Error::from(e.into_error()))
    }

    pub fn write_csv(&self, path: &Path) -> PersistResult<()> {
        let bytes = self.to_csv_bytes().map_err(|e| PersistError::csv(path, e))?;
        atomic_write(path, &bytes)
    }

    /// Full row objects, extra attributes included.
    pub fn write_json(&self, path: &Path) -> PersistResult<()> {
        write_json(path, &self.rows)
    }
}

/// Concatenate in `Venue::ALL` order, then stable-sort by (exchange, symbol).
pub fn combine(parts: Vec<VenueRows>) -> CombinedTable {
    let rows = Venue::ALL
        .iter()
        .flat_map(|v| parts.iter().filter(move |p| p.venue == *v))
        .flat_map(|p| p.rows.iter().cloned())
        .sorted_by(|a, b| (&a.exchange, &a.symbol_raw).cmp(&(&b.exchange, &b.symbol_raw)))
        .collect::<Vec<_>>();

    let placeholder_venues = parts.iter().filter(|p| p.source == RowSource::Placeholder).count();
    info!(rows = rows.len(), placeholder_venues, "combined table built");
    CombinedTable { rows }
}
