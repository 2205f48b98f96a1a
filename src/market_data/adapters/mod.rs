// Shared trait + outcome type for venue adapters

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use crate::market_data::transport::{Transport, TransportError};
use crate::schema::{CanonicalRow, SnapshotDate, Venue};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected {venue} payload: {reason}")]
    Payload { venue: Venue, reason: String },
}

impl AdapterError {
    pub fn payload(venue: Venue, reason: impl ToString) -> Self {
        AdapterError::Payload { venue, reason: reason.to_string() }
    }
}

/// Result of one adapter run, consumed by the combiner.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutcome {
    Collected(Vec<CanonicalRow>),
    Failed { reason: String },
}

impl AdapterOutcome {
    pub fn rows(&self) -> Option<&[CanonicalRow]> {
        match self {
            AdapterOutcome::Collected(rows) => Some(rows),
            AdapterOutcome::Failed { .. } => None,
        }
    }
}

/// One implementation per venue: fetch the raw market listing, then map each market to a row.
///
/// `normalize` must not fail; a field it cannot derive is left blank.
#[async_trait::async_trait]
pub trait VenueAdapter: Send + Sync {
    type Market: Send;

    fn venue(&self) -> Venue;

    async fn fetch_markets(&self, transport: &dyn Transport) -> Result<Vec<Self::Market>, AdapterError>;

    /// `None` skips the market (no usable symbol).
    fn normalize(&self, market: &Self::Market, date: &SnapshotDate) -> Option<CanonicalRow>;
}

/// Fetch and normalize, keeping the first row for each symbol.
#[instrument(skip(adapter, transport, date), fields(venue = %adapter.venue()))]
pub async fn collect<A: VenueAdapter + ?Sized>(
    adapter: &A,
    transport: &dyn Transport,
    date: &SnapshotDate,
) -> Result<Vec<CanonicalRow>, AdapterError> {
    let venue = adapter.venue();
    let markets = adapter.fetch_markets(transport).await?;

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(markets.len());
    let mut skipped = 0usize;
    for market in &markets {
        let Some(row) = adapter.normalize(market, date) else {
            skipped += 1;
            continue;
        };
        if !seen.insert(row.symbol_raw.clone()) {
            warn!(%venue, symbol = %row.symbol_raw, "duplicate symbol in venue payload, keeping first");
            continue;
        }
        rows.push(row);
    }

    if skipped > 0 {
        warn!(%venue, skipped, "markets without a usable symbol were skipped");
    }
    metrics::counter!("dex_snap_rows_total", "venue" => venue.as_str()).increment(rows.len() as u64);
    info!(%venue, markets = markets.len(), rows = rows.len(), "venue collected");
    Ok(rows)
}

/// `collect`, with failures folded into an `AdapterOutcome`.
pub async fn run_adapter<A: VenueAdapter + ?Sized>(
    adapter: &A,
    transport: &dyn Transport,
    date: &SnapshotDate,
) -> AdapterOutcome {
    match collect(adapter, transport, date).await {
        Ok(rows) => AdapterOutcome::Collected(rows),
        Err(e) => {
            warn!(venue = %adapter.venue(), error = %e, "venue collection failed");
            AdapterOutcome::Failed { reason: e.to_string() }
        }
    }
}

pub mod drift;
pub mod drift_types;
pub mod dydx;
pub mod dydx_types;
pub mod hyperliquid;
pub mod hyperliquid_types;

pub use drift::DriftAdapter;
pub use dydx::DydxAdapter;
pub use hyperliquid::HyperliquidAdapter;
