// dYdX v4 adapter (indexer REST)

use serde_json::Value;
use tracing::debug;

use super::dydx_types::{PerpetualMarketsResponse, TickerMarket};
use super::{AdapterError, VenueAdapter};
use crate::market_data::transport::Transport;
use crate::schema::normalize::truncate_to_int;
use crate::schema::{CanonicalRow, MarketMetrics, MarketType, SnapshotDate, Venue};

pub struct DydxAdapter {
    pub indexer_url: String, // "https://indexer.dydx.trade"
}

impl DydxAdapter {
    pub fn new(indexer_url: &str) -> Self {
        Self { indexer_url: indexer_url.trim_end_matches('/').to_string() }
    }

    pub fn markets_url(&self) -> String {
        format!("{}/v4/perpetualMarkets", self.indexer_url)
    }
}

/// Max leverage is `1 / initialMarginFraction`, only for a positive fraction.
pub fn leverage(initial_margin_fraction: Option<f64>) -> Option<i64> {
    match initial_margin_fraction {
        Some(imf) if imf > 0.0 => truncate_to_int(1.0 / imf),
        _ => None,
    }
}

#[async_trait::async_trait]
impl VenueAdapter for DydxAdapter {
    type Market = TickerMarket;

    fn venue(&self) -> Venue {
        Venue::Dydx
    }

    async fn fetch_markets(&self, transport: &dyn Transport) -> Result<Vec<TickerMarket>, AdapterError> {
        let js = transport.get_json(&self.markets_url()).await?;
        let parsed: PerpetualMarketsResponse =
            serde_json::from_value(js).map_err(|e| AdapterError::payload(Venue::Dydx, e))?;
        debug!(markets = parsed.markets.len(), "dydx markets fetched");
        Ok(parsed
            .markets
            .into_iter()
            .map(|(ticker, market)| TickerMarket { ticker, market })
            .collect())
    }

    fn normalize(&self, m: &TickerMarket, date: &SnapshotDate) -> Option<CanonicalRow> {
        if m.ticker.trim().is_empty() {
            return None;
        }
        let market_type = match &m.market.market_type {
            Some(Value::String(s)) => MarketType::parse(s),
            _ => MarketType::Unknown,
        };
        let metrics = MarketMetrics {
            market_type,
            leverage_max: leverage(m.market.initial_margin_fraction),
            price_usd: m.market.oracle_price,
            volume_24h_usd: m.market.volume_24h,
            open_interest_base: m.market.open_interest,
        };
        Some(CanonicalRow::from_metrics(Venue::Dydx, &m.ticker, date, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::collect;
    use crate::market_data::transport::fixture::FixtureTransport;
    use serde_json::json;

    const URL: &str = "https://dydx.test/";

    fn date() -> SnapshotDate {
        SnapshotDate::parse("2025-08-20").unwrap()
    }

    #[test]
    fn test_leverage_from_margin_fraction() {
        assert_eq!(leverage(Some(0.05)), Some(20));
        assert_eq!(leverage(Some(0.02)), Some(50));
        assert_eq!(leverage(Some(0.1)), Some(10));
        assert_eq!(leverage(Some(0.0)), None);
        assert_eq!(leverage(Some(-0.1)), None);
        assert_eq!(leverage(None), None);
    }

    #[tokio::test]
    async fn test_uses_base_open_interest_only() {
        let adapter = DydxAdapter::new(URL);
        assert_eq!(adapter.markets_url(), "https://dydx.test/v4/perpetualMarkets");
        let payload = json!({"markets": {
            "SOL-USD": {
                "ticker": "SOL-USD",
                "oraclePrice": "150.0",
                "volume24H": "1234.5",
                "openInterest": "3",
                "baseOpenInterest": "999999",
                "initialMarginFraction": "0.05",
                "marketType": "CROSS"
            },
            "ARB-USD": {
                "oraclePrice": "",
                "volume24H": "0",
                "openInterest": "100",
                "initialMarginFraction": "0",
                "marketType": "ISOLATED"
            },
            "pepe-usd": {
                "oraclePrice": "0.00001",
                "marketType": "PERPETUAL_MARKET_TYPE_UNSPECIFIED"
            }
        }});
        let transport = FixtureTransport::default().with(&adapter.markets_url(), payload);
        let rows = collect(&adapter, &transport, &date()).await.unwrap();
        assert_eq!(rows.len(), 3);

        let sol = rows.iter().find(|r| r.symbol_raw == "SOL-USD").unwrap();
        assert_eq!(sol.open_interest_base, Some(3.0));
        assert_eq!(sol.open_interest_usd, Some(450.0));
        assert_eq!(sol.leverage_max, Some(20));
        assert_eq!(sol.market_type, MarketType::Cross);

        let arb = rows.iter().find(|r| r.symbol_raw == "ARB-USD").unwrap();
        assert_eq!(arb.price_usd, None);
        assert_eq!(arb.open_interest_usd, None);
        assert_eq!(arb.volume_24h_usd, Some(0.0));
        assert_eq!(arb.leverage_max, None);
        assert_eq!(arb.market_type, MarketType::Isolated);

        let pepe = rows.iter().find(|r| r.symbol_raw == "PEPE-USD").unwrap();
        assert_eq!(pepe.market_type, MarketType::Unknown);
        assert_eq!(pepe.open_interest_base, None);
    }

    #[tokio::test]
    async fn test_missing_markets_key_fails() {
        let adapter = DydxAdapter::new(URL);
        let transport = FixtureTransport::default().with(&adapter.markets_url(), json!({"errors": []}));
        assert!(collect(&adapter, &transport, &date()).await.is_err());
    }
}
