// Drift adapter (Cosmic markets API, paged)

use serde_json::Value;
use tracing::debug;

use super::drift_types::{DriftMarket, DriftPage};
use super::{AdapterError, VenueAdapter};
use crate::market_data::transport::Transport;
use crate::schema::{CanonicalRow, MarketMetrics, MarketType, SnapshotDate, Venue};

pub struct DriftAdapter {
    pub markets_url: String, // "https://api.cosmic.markets/api/drift/markets"
    pub page_size: u32,
}

impl DriftAdapter {
    pub fn new(markets_url: &str, page_size: u32) -> Self {
        Self { markets_url: markets_url.to_string(), page_size }
    }

    pub fn page_url(&self, page: i64) -> String {
        format!(
            "{}?page={page}&size={}&sortField=marketIndex&sortOrder=ascend&status=all&minutes=1440",
            self.markets_url, self.page_size
        )
    }
}

/// Max leverage: the high-leverage multiplier applies only when the venue reports a non-zero
/// high-leverage margin ratio.
pub fn leverage(m: &DriftMarket) -> Option<i64> {
    match m.high_leverage_initial_margin_ratio_decimal {
        None => m.margin_ratio_initial_multiplier,
        Some(r) if r == 0.0 => m.margin_ratio_initial_multiplier,
        Some(_) => m.high_leverage_initial_margin_multiplier,
    }
}

/// Venue status code: `1` is active, any other integer inactive, unreadable counts as active.
pub fn status_label(code: Option<&Value>) -> &'static str {
    let parsed = match code {
        Some(Value::Number(n)) => n.as_f64().and_then(crate::schema::normalize::truncate_to_int),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(1) | None => "ACTIVE",
        Some(_) => "INACTIVE",
    }
}

fn symbol_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[async_trait::async_trait]
impl VenueAdapter for DriftAdapter {
    type Market = DriftMarket;

    fn venue(&self) -> Venue {
        Venue::Drift
    }

    async fn fetch_markets(&self, transport: &dyn Transport) -> Result<Vec<DriftMarket>, AdapterError> {
        let mut out = Vec::new();
        let mut page = 1i64;
        loop {
            let js = transport.get_json(&self.page_url(page)).await?;
            let parsed: DriftPage = serde_json::from_value(js)
                .map_err(|e| AdapterError::payload(Venue::Drift, format!("page {page}: {e}")))?;
            let total_pages = parsed.total_pages.unwrap_or(1);
            debug!(page, total_pages, markets = parsed.content.len(), "drift page fetched");
            out.extend(parsed.content);
            if page >= total_pages {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    fn normalize(&self, m: &DriftMarket, date: &SnapshotDate) -> Option<CanonicalRow> {
        let base = symbol_text(m.base_asset_symbol.as_ref()).to_uppercase();
        if base.is_empty() {
            return None;
        }
        let metrics = MarketMetrics {
            market_type: MarketType::Cross,
            leverage_max: leverage(m),
            price_usd: m.last_oracle_price,
            volume_24h_usd: m.recent_volume,
            open_interest_base: m.open_interest,
        };
        let row = CanonicalRow::from_metrics(Venue::Drift, &format!("{base}-USD"), date, metrics)
            .with_extra("status", status_label(m.status.as_ref()));
        Some(row)
    }
}
