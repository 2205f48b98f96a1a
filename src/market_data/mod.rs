// Market data module entrypoint
pub mod adapters;     // one VenueAdapter per exchange
pub mod transport;    // JSON-over-HTTP seam with bounded retries
pub mod placeholders; // stand-in rows for venues that produced nothing
pub mod combiner;     // merges venue rows into the combined table
