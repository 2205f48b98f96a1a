use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::normalize::{
    blank, derive_oi_usd, float_or_blank, format_float, int_or_blank, normalize_symbol,
};

/// Fixed column order for every CSV artifact (combined output and history ledger).
pub const CSV_FIELDS: [&str; 9] = [
    "exchange",
    "market_type",
    "symbol_raw",
    "leverage_max",
    "price_usd",
    "volume_24h_usd",
    "open_interest_base",
    "open_interest_usd",
    "daily_snapshot",
];

/// Supported venues, in the fixed order the combiner concatenates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Venue {
    Drift,
    Hyperliquid,
    Dydx,
}

impl Venue {
    pub const ALL: [Venue; 3] = [Venue::Drift, Venue::Hyperliquid, Venue::Dydx];

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Drift => "drift",
            Venue::Hyperliquid => "hyperliquid",
            Venue::Dydx => "dydx",
        }
    }

    /// Name of the per-run artifact in a staging directory.
    pub fn artifact_name(&self) -> String {
        format!("{}_latest.json", self.as_str())
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drift" => Ok(Venue::Drift),
            "hyperliquid" | "hl" => Ok(Venue::Hyperliquid),
            "dydx" => Ok(Venue::Dydx),
            other => Err(format!("unknown venue: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketType {
    Cross,
    Isolated,
    #[default]
    Unknown,
}

impl MarketType {
    /// Case-insensitive prefix match; anything else is unknown.
    pub fn parse(s: &str) -> Self {
        let t = s.trim().to_uppercase();
        if t.starts_with("CROSS") {
            MarketType::Cross
        } else if t.starts_with("ISOLATED") {
            MarketType::Isolated
        } else {
            MarketType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Cross => "CROSS",
            MarketType::Isolated => "ISOLATED",
            MarketType::Unknown => "",
        }
    }
}

impl Serialize for MarketType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MarketType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(match v {
            Some(Value::String(s)) => MarketType::parse(&s),
            _ => MarketType::Unknown,
        })
    }
}

/// Logical date of a snapshot run (`YYYY-MM-DD`), independent of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotDate(NaiveDate);

impl SnapshotDate {
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map(SnapshotDate)
    }

    pub fn today_utc() -> Self {
        SnapshotDate(chrono::Utc::now().date_naive())
    }

    /// `YYYYMMDD`, used in staging and archive file names.
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    pub fn year(&self) -> String {
        self.0.format("%Y").to_string()
    }
}

impl fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for SnapshotDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotDate::parse(s)
    }
}

/// Venue-side metrics before they are bound to a symbol and date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketMetrics {
    pub market_type: MarketType,
    pub leverage_max: Option<i64>,
    pub price_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub open_interest_base: Option<f64>,
}

/// Deduplication identity of a row: (date, lowercase exchange, uppercase symbol).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub daily_snapshot: String,
    pub exchange: String,
    pub symbol_raw: String,
}

impl RowKey {
    pub fn new(daily_snapshot: &str, exchange: &str, symbol_raw: &str) -> Self {
        Self {
            daily_snapshot: daily_snapshot.to_string(),
            exchange: exchange.to_lowercase(),
            symbol_raw: symbol_raw.to_uppercase(),
        }
    }
}

/// One market's snapshot on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub market_type: MarketType,
    pub symbol_raw: String,
    #[serde(default, with = "blank::int")]
    pub leverage_max: Option<i64>,
    #[serde(default, with = "blank::float")]
    pub price_usd: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub volume_24h_usd: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub open_interest_base: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub open_interest_usd: Option<f64>,
    #[serde(default)]
    pub daily_snapshot: String,
    /// Venue attributes outside the fixed columns. Kept in JSON, dropped from CSV.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalRow {
    /// Build a row from venue metrics. `open_interest_usd` is always derived here.
    pub fn from_metrics(venue: Venue, symbol: &str, date: &SnapshotDate, m: MarketMetrics) -> Self {
        Self {
            exchange: venue.as_str().to_string(),
            market_type: m.market_type,
            symbol_raw: normalize_symbol(symbol),
            leverage_max: m.leverage_max,
            price_usd: m.price_usd,
            volume_24h_usd: m.volume_24h_usd,
            open_interest_base: m.open_interest_base,
            open_interest_usd: derive_oi_usd(m.open_interest_base, m.price_usd),
            daily_snapshot: date.to_string(),
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Re-apply the schema invariants to a row read back from an artifact.
    pub fn renormalized(mut self, venue: Venue, date: &SnapshotDate) -> Self {
        if self.exchange.trim().is_empty() {
            self.exchange = venue.as_str().to_string();
        }
        self.exchange = self.exchange.trim().to_lowercase();
        self.symbol_raw = normalize_symbol(&self.symbol_raw);
        if self.daily_snapshot.trim().is_empty() {
            self.daily_snapshot = date.to_string();
        }
        self.open_interest_usd = derive_oi_usd(self.open_interest_base, self.price_usd);
        self
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(&self.daily_snapshot, &self.exchange, &self.symbol_raw)
    }

    /// Values in `CSV_FIELDS` order; blank is the empty string.
    pub fn to_record(&self) -> [String; 9] {
        let float = |v: Option<f64>| v.map(format_float).unwrap_or_default();
        [
            self.exchange.clone(),
            self.market_type.as_str().to_string(),
            self.symbol_raw.clone(),
            self.leverage_max.map(|v| v.to_string()).unwrap_or_default(),
            float(self.price_usd),
            float(self.volume_24h_usd),
            float(self.open_interest_base),
            float(self.open_interest_usd),
            self.daily_snapshot.clone(),
        ]
    }

    /// Rebuild a row from a CSV record, looking fields up by header name.
    /// Values are taken as written; nothing is re-derived.
    pub fn from_record(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let field = |name: &str| -> &str {
            headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| record.get(i))
                .unwrap_or("")
        };
        Self {
            exchange: field("exchange").to_string(),
            market_type: MarketType::parse(field("market_type")),
            symbol_raw: field("symbol_raw").to_string(),
            leverage_max: int_or_blank(field("leverage_max")),
            price_usd: float_or_blank(field("price_usd")),
            volume_24h_usd: float_or_blank(field("volume_24h_usd")),
            open_interest_base: float_or_blank(field("open_interest_base")),
            open_interest_usd: float_or_blank(field("open_interest_usd")),
            daily_snapshot: field("daily_snapshot").to_string(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> SnapshotDate {
        SnapshotDate::parse("2025-08-20").unwrap()
    }

    #[test]
    fn test_market_type_prefix_match() {
        assert_eq!(MarketType::parse("cross"), MarketType::Cross);
        assert_eq!(MarketType::parse("CROSS_MARGIN"), MarketType::Cross);
        assert_eq!(MarketType::parse(" isolated "), MarketType::Isolated);
        assert_eq!(MarketType::parse("portfolio"), MarketType::Unknown);
        assert_eq!(MarketType::parse(""), MarketType::Unknown);
    }

    #[test]
    fn test_snapshot_date_forms() {
        let d = date();
        assert_eq!(d.to_string(), "2025-08-20");
        assert_eq!(d.compact(), "20250820");
        assert_eq!(d.year(), "2025");
        assert!(SnapshotDate::parse("2025-13-01").is_err());
    }

    #[test]
    fn test_from_metrics_derives_oi_usd() {
        let m = MarketMetrics {
            price_usd: Some(60000.0),
            open_interest_base: Some(2.0),
            ..Default::default()
        };
        let row = CanonicalRow::from_metrics(Venue::Drift, "btc", &date(), m);
        assert_eq!(row.symbol_raw, "BTC-USD");
        assert_eq!(row.open_interest_usd, Some(120000.0));

        let m = MarketMetrics { open_interest_base: Some(2.0), ..Default::default() };
        let row = CanonicalRow::from_metrics(Venue::Drift, "btc", &date(), m);
        assert_eq!(row.open_interest_usd, None);
    }

    #[test]
    fn test_json_blank_vs_zero() {
        let m = MarketMetrics { volume_24h_usd: Some(0.0), ..Default::default() };
        let row = CanonicalRow::from_metrics(Venue::Dydx, "SOL-USD", &date(), m);
        let js = serde_json::to_value(&row).unwrap();
        assert_eq!(js["volume_24h_usd"], serde_json::json!(0.0));
        assert_eq!(js["price_usd"], serde_json::json!(""));
        assert_eq!(js["market_type"], serde_json::json!(""));

        let back: CanonicalRow = serde_json::from_value(js).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_extra_fields_survive_json() {
        let raw = r#"{"exchange":"drift","symbol_raw":"SOL-USD","status":"ACTIVE","price_usd":"150"}"#;
        let row: CanonicalRow = serde_json::from_str(raw).unwrap();
        assert_eq!(row.price_usd, Some(150.0));
        assert_eq!(row.extra.get("status"), Some(&Value::from("ACTIVE")));
        let out = serde_json::to_value(&row).unwrap();
        assert_eq!(out["status"], "ACTIVE");
    }

    #[test]
    fn test_renormalized_rederives_oi_usd() {
        let raw = r#"{"exchange":"","symbol_raw":"btc","price_usd":60000,"volume_24h_usd":100,
                      "open_interest_base":2,"open_interest_usd":""}"#;
        let row: CanonicalRow = serde_json::from_str(raw).unwrap();
        let row = row.renormalized(Venue::Drift, &date());
        assert_eq!(row.exchange, "drift");
        assert_eq!(row.symbol_raw, "BTC-USD");
        assert_eq!(row.daily_snapshot, "2025-08-20");
        assert_eq!(row.open_interest_usd, Some(120000.0));
    }

    #[test]
    fn test_record_roundtrip_by_header() {
        let m = MarketMetrics {
            market_type: MarketType::Isolated,
            leverage_max: Some(20),
            price_usd: Some(1.5),
            volume_24h_usd: Some(0.0),
            open_interest_base: None,
        };
        let row = CanonicalRow::from_metrics(Venue::Dydx, "ARB-USD", &date(), m);
        let rec = row.to_record();
        assert_eq!(rec[3], "20");
        assert_eq!(rec[5], "0.0");
        assert_eq!(rec[6], "");

        let headers = csv::StringRecord::from(CSV_FIELDS.to_vec());
        let back = CanonicalRow::from_record(&headers, &csv::StringRecord::from(rec.to_vec()));
        assert_eq!(back, row);
    }

    #[test]
    fn test_row_key_casing() {
        let a = RowKey::new("2025-08-20", "DYDX", "sol-usd");
        let b = RowKey::new("2025-08-20", "dydx", "SOL-USD");
        assert_eq!(a, b);
    }
}
