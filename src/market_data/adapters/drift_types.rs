// Source: Cosmic API, GET /api/drift/markets (paged)
use serde::Deserialize;
use serde_json::Value;

use crate::schema::normalize::blank;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftPage {
    #[serde(default)]
    pub content: Vec<DriftMarket>,
    #[serde(default, with = "blank::int")]
    pub total_pages: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftMarket {
    #[serde(default)]
    pub base_asset_symbol: Option<Value>,
    #[serde(default, with = "blank::float")]
    pub last_oracle_price: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub recent_volume: Option<f64>,
    /// Base units.
    #[serde(default, with = "blank::float")]
    pub open_interest: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub high_leverage_initial_margin_ratio_decimal: Option<f64>,
    #[serde(default, with = "blank::int")]
    pub margin_ratio_initial_multiplier: Option<i64>,
    #[serde(default, with = "blank::int")]
    pub high_leverage_initial_margin_multiplier: Option<i64>,
    #[serde(default)]
    pub status: Option<Value>,
    // market index, fees, funding etc. are ignored
}
