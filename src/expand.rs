// Attribute expander
// Turns per-row "key:value" attribute strings into first-class sparse
// columns. Keys are whatever the source printed, locale and all; the
// reconciler sorts out synonyms afterwards.

use crate::table::{ListingTable, Value};
use std::collections::HashSet;
use tracing::warn;

/// Field raw records use for their free-form attribute strings.
pub const ATTRS_COLUMN: &str = "attrs";

/// Expand the attribute column into one sparse column per distinct key,
/// then remove the attribute column itself.
///
/// Each entry is split on its FIRST colon: the left part (trimmed) names
/// the column, the right part (kept verbatim) is the value. An entry with
/// no colon is malformed: it is dropped with a warning and the row is kept.
///
/// Row count and order are untouched. Collision policy is keep-first: an
/// attribute key equal to an existing base column name is discarded
/// wholesale, and within one row's attrs the first occurrence of a key
/// wins.
pub fn expand_attributes(table: &mut ListingTable, attrs_column: &str) {
    if !table.has_column(attrs_column) {
        return;
    }

    let mut parsed: Vec<Vec<(String, String)>> = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let entries: Vec<String> = match table.get(row, attrs_column) {
            Value::List(items) => items.clone(),
            // Some adapters hand back a single attribute as a bare string
            Value::Str(s) => vec![s.clone()],
            _ => Vec::new(),
        };

        let mut pairs: Vec<(String, String)> = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.split_once(':') {
                Some((key, value)) => {
                    let key = key.trim().to_string();
                    if pairs.iter().any(|(k, _)| *k == key) {
                        continue;
                    }
                    pairs.push((key, value.to_string()));
                }
                None => {
                    warn!(row, entry = entry.as_str(), "dropping malformed attribute entry");
                }
            }
        }
        parsed.push(pairs);
    }

    table.drop_column(attrs_column);

    // Keep-first: columns that predate expansion win over colliding keys,
    // even for rows where the base cell is null.
    let base_columns: HashSet<String> = table.columns().iter().cloned().collect();

    for (row, pairs) in parsed.into_iter().enumerate() {
        for (key, value) in pairs {
            if base_columns.contains(&key) {
                continue;
            }
            table.set(row, &key, Value::Str(value));
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
