// Record source boundary
// Fetching listings from the outside world lives behind ListingSource; the
// pipeline only ever sees raw records that have already been retrieved.

use crate::error::FetchError;
use crate::table::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Search filters forwarded verbatim to the adapter (e.g. `has_image`,
/// `min_price`). The pipeline never interprets them.
pub type SearchFilters = BTreeMap<String, serde_json::Value>;

// ============================================================================
// RAW RECORD
// ============================================================================

/// One listing as the adapter returned it: field name → string, list of
/// strings, or null. The `attrs` field, when present, holds the ordered
/// `"key:value"` attribute strings the expander consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        RawRecord::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Builder used heavily in tests and file-backed adapters.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode one JSON object into a raw record.
    pub fn from_json_value(json: serde_json::Value) -> Result<RawRecord, FetchError> {
        let object = match json {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(FetchError::new(format!(
                    "raw record must be a JSON object, got: {other}"
                )))
            }
        };
        let mut record = RawRecord::new();
        for (name, value) in object {
            record.insert(name, Value::from_json(value));
        }
        Ok(record)
    }
}

impl IntoIterator for RawRecord {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// Record source adapter: yields the raw listings for one city/category.
///
/// Implementations own their transport, timeouts and retries. An error here
/// fails the whole sweep for the run (fail-fast, tagged with the city).
pub trait ListingSource: Send + Sync {
    /// Fetch every listing for a city/category under the given filters.
    /// An empty vector is a normal outcome, not an error.
    fn fetch(
        &self,
        city: &str,
        category: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<RawRecord>, FetchError>;

    /// Whether this source can serve the given city identifier. Used to
    /// reject typo'd cities before any fetch happens. Default: accept all.
    fn knows_city(&self, _city: &str) -> bool {
        true
    }
}

// ============================================================================
// FILE-BACKED SOURCE
// ============================================================================

/// Adapter over pre-fetched record dumps on disk: one JSON array of record
/// objects per `<root>/<city>/<category>.json`. A missing category file is
/// an empty result; a missing city directory is an unknown city.
pub struct JsonFileSource {
    root: PathBuf,
}

impl JsonFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFileSource { root: root.into() }
    }
}

impl ListingSource for JsonFileSource {
    fn fetch(
        &self,
        city: &str,
        category: &str,
        _filters: &SearchFilters,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let path = self.root.join(city).join(format!("{category}.json"));
        if !path.exists() {
            debug!(city, category, "no record dump for city/category, treating as empty");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        let items = match json {
            serde_json::Value::Array(items) => items,
            _ => {
                return Err(FetchError::new(format!(
                    "expected a JSON array of records in {}",
                    path.display()
                )))
            }
        };

        let records = items
            .into_iter()
            .map(RawRecord::from_json_value)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(city, category, count = records.len(), "loaded raw records");
        Ok(records)
    }

    fn knows_city(&self, city: &str) -> bool {
        self.root.join(city).is_dir()
    }
}

// ============================================================================
// TESTS
// ============================================================================
