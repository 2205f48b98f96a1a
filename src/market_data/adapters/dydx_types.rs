// Source: dYdX v4 indexer, GET /v4/perpetualMarkets
use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::schema::normalize::blank;

#[derive(Debug, Deserialize)]
pub struct PerpetualMarketsResponse {
    pub markets: BTreeMap<String, DydxMarket>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DydxMarket {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default, with = "blank::float")]
    pub oracle_price: Option<f64>,
    #[serde(default, rename = "volume24H", with = "blank::float")]
    pub volume_24h: Option<f64>,
    /// Base units. `baseOpenInterest` is ignored.
    #[serde(default, with = "blank::float")]
    pub open_interest: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub initial_margin_fraction: Option<f64>,
    #[serde(default)]
    pub market_type: Option<Value>,
}

/// A market with the ticker it was keyed under.
#[derive(Debug)]
pub struct TickerMarket {
    pub ticker: String,
    pub market: DydxMarket,
}
