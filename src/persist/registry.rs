use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persist::artifact::write_json;
use crate::persist::types::{PersistError, PersistResult};
use crate::persist::SymbolRegistry;
use crate::schema::{normalize_symbol, Venue};

/// On-disk form. A bare array is still accepted on read.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    Object { symbols: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// Registry stored as `<dir>/<venue>_symbols.json`.
pub struct FileRegistry {
    dir: PathBuf,
}

impl FileRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, venue: Venue) -> PathBuf {
        self.dir.join(format!("{}_symbols.json", venue.as_str()))
    }

    fn parse(path: &Path, bytes: &[u8]) -> BTreeSet<String> {
        let values = match serde_json::from_slice::<RegistryFile>(bytes) {
            Ok(RegistryFile::Object { symbols }) | Ok(RegistryFile::Bare(symbols)) => symbols,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparseable symbol registry");
                return BTreeSet::new();
            }
        };
        values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl SymbolRegistry for FileRegistry {
    fn read(&self, venue: Venue) -> PersistResult<BTreeSet<String>> {
        let path = self.path_for(venue);
        match fs::read(&path) {
            Ok(bytes) => Ok(Self::parse(&path, &bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%venue, path = %path.display(), "no symbol registry yet");
                Ok(BTreeSet::new())
            }
            Err(e) => Err(PersistError::io(&path, e)),
        }
    }

    fn write(&self, venue: Venue, symbols: &BTreeSet<String>) -> PersistResult<()> {
        let unique: BTreeSet<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        let body = RegistryFile::Object {
            symbols: unique.into_iter().map(serde_json::Value::String).collect(),
        };
        write_json(&self.path_for(venue), &body)
    }
}

/// Merge freshly collected symbols into the venue's registry. The registry only grows.
pub fn record_symbols<R: SymbolRegistry + ?Sized>(
    registry: &R,
    venue: Venue,
    symbols: impl IntoIterator<Item = String>,
) -> PersistResult<usize> {
    let mut known = registry.read(venue)?;
    let before = known.len();
    known.extend(symbols.into_iter().map(|s| normalize_symbol(&s)).filter(|s| !s.is_empty()));
    registry.write(venue, &known)?;
    debug!(%venue, added = known.len() - before, total = known.len(), "symbol registry updated");
    Ok(known.len())
}
