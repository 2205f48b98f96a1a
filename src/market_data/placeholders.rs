// Stand-in rows for a venue whose collection produced nothing usable.

use std::collections::BTreeSet;

use tracing::info;

use crate::schema::{CanonicalRow, MarketMetrics, MarketType, SnapshotDate, Venue};

/// One row per registered symbol: volume and open interest are `0.0`, everything else blank.
pub fn placeholders(venue: Venue, symbols: &BTreeSet<String>, date: &SnapshotDate) -> Vec<CanonicalRow> {
    let mut seen = BTreeSet::new();
    let rows: Vec<CanonicalRow> = symbols
        .iter()
        .filter_map(|s| {
            let metrics = MarketMetrics {
                market_type: MarketType::Unknown,
                leverage_max: None,
                price_usd: None,
                volume_24h_usd: Some(0.0),
                open_interest_base: Some(0.0),
            };
            let mut row = CanonicalRow::from_metrics(venue, s, date, metrics);
            if row.symbol_raw.is_empty() || !seen.insert(row.symbol_raw.clone()) {
                return None;
            }
            row.open_interest_usd = Some(0.0);
            Some(row)
        })
        .collect();

    metrics::counter!("dex_snap_placeholder_rows_total", "venue" => venue.as_str())
        .increment(rows.len() as u64);
    info!(%venue, rows = rows.len(), "placeholder rows synthesized");
    rows
}
