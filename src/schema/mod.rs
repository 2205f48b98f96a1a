// Canonical row schema shared by adapters, combiner and history
pub mod normalize;  // symbol / numeric coercion + serde helpers for blank fields
pub mod row;        // CanonicalRow, Venue, MarketType, SnapshotDate

pub use normalize::normalize_symbol;
pub use row::{CanonicalRow, MarketMetrics, MarketType, RowKey, SnapshotDate, Venue, CSV_FIELDS};
