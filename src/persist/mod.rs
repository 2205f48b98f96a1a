pub mod types;
pub use types::*;
pub mod artifact;
pub mod registry;
pub mod history;
pub mod publisher;

use std::collections::BTreeSet;

use crate::schema::Venue;

/// Per-venue set of previously seen symbols.
///
/// Adapters write to it after a successful collection; the placeholder synthesizer only reads.
pub trait SymbolRegistry {
    fn read(&self, venue: Venue) -> PersistResult<BTreeSet<String>>;
    fn write(&self, venue: Venue, symbols: &BTreeSet<String>) -> PersistResult<()>;
}
