// Field reconciler
// Sources name the same attribute differently per locale ("mfg_year",
// "año de fabricación"). Synonym groups are data, not code: each maps an
// ordered list of source columns onto one canonical column.

use crate::table::{ListingTable, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One canonical column plus the source columns considered equivalent,
/// in precedence order (first non-null wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub canonical: String,
    pub sources: Vec<String>,
}

impl SynonymGroup {
    pub fn new(canonical: impl Into<String>, sources: &[&str]) -> Self {
        SynonymGroup {
            canonical: canonical.into(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Apply every group in declared order.
pub fn apply_synonym_groups(table: &mut ListingTable, groups: &[SynonymGroup]) {
    for group in groups {
        apply_group(table, group);
    }
}

/// Fold a group's source columns into its canonical column, then drop the
/// source columns.
///
/// Per row, an already-present canonical value is kept; otherwise the first
/// non-null value among the source columns, scanned in declared order, is
/// promoted. A group none of whose source columns exist is a no-op. The
/// outcome depends only on the declared ordering, never on table internals.
fn apply_group(table: &mut ListingTable, group: &SynonymGroup) {
    let present: Vec<String> = group
        .sources
        .iter()
        .filter(|s| table.has_column(s))
        .cloned()
        .collect();
    if present.is_empty() {
        return;
    }

    table.ensure_column(&group.canonical);
    for row in 0..table.row_count() {
        if !table.get(row, &group.canonical).is_null() {
            continue;
        }
        for source in &present {
            let value = table.get(row, source).clone();
            if !value.is_null() {
                table.set(row, &group.canonical, value);
                break;
            }
        }
    }

    for source in &present {
        if source != &group.canonical {
            table.drop_column(source);
        }
    }
    debug!(
        canonical = group.canonical.as_str(),
        folded = present.len(),
        "reconciled synonym group"
    );
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table_of(rows: Vec<Vec<(&str, &str)>>) -> ListingTable {
        let mut table = ListingTable::new();
        for cells in rows {
            table.push_row(
                cells
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), Value::Str(value.to_string()))),
            );
        }
        table
    }

    #[test]
    fn test_first_non_null_wins_and_sources_removed() {
        let mut table = table_of(vec![
            vec![("mfg_year", "1999")],
            vec![("año de fabricación", "2005")],
            vec![("mfg_year", "1987"), ("año de fabricación", "2010")],
        ]);
        let group = SynonymGroup::new("year manufactured", &["mfg_year", "año de fabricación"]);

        apply_synonym_groups(&mut table, &[group]);

        assert_eq!(table.get(0, "year manufactured").as_str(), Some("1999"));
        assert_eq!(table.get(1, "year manufactured").as_str(), Some("2005"));
        // Declared order decides the tie, not column position
        assert_eq!(table.get(2, "year manufactured").as_str(), Some("1987"));
        assert!(!table.has_column("mfg_year"));
        assert!(!table.has_column("año de fabricación"));
    }

    #[test]
    fn test_canonical_filled_wherever_any_source_had_a_value() {
        let mut table = table_of(vec![
            vec![("condición", "good")],
            vec![("name", "no condition at all")],
        ]);
        apply_synonym_groups(&mut table, &[SynonymGroup::new("condition", &["condición"])]);

        assert_eq!(table.get(0, "condition").as_str(), Some("good"));
        assert!(table.get(1, "condition").is_null());
        assert!(!table.has_column("condición"));
    }

    #[test]
    fn test_existing_canonical_value_is_kept() {
        let mut table = table_of(vec![vec![
            ("year manufactured", "2001"),
            ("mfg_year", "1999"),
        ]]);
        apply_synonym_groups(
            &mut table,
            &[SynonymGroup::new("year manufactured", &["mfg_year"])],
        );
        assert_eq!(table.get(0, "year manufactured").as_str(), Some("2001"));
        assert!(!table.has_column("mfg_year"));
    }

    #[test]
    fn test_group_with_no_present_sources_is_noop() {
        let mut table = table_of(vec![vec![("name", "Boat")]]);
        let before = table.clone();
        apply_synonym_groups(
            &mut table,
            &[SynonymGroup::new("condition", &["condición", "zustand"])],
        );
        assert_eq!(table, before);
        assert!(!table.has_column("condition"));
    }

    #[test]
    fn test_groups_apply_in_declared_order() {
        // The engine itself is strictly sequential, so chained groups are
        // well-defined here. RunConfig validation still rejects configs
        // where a canonical doubles as another group's source.
        let mut table = table_of(vec![vec![("condición", "fair")]]);
        let groups = vec![
            SynonymGroup::new("condition", &["condición"]),
            SynonymGroup::new("state", &["condition"]),
        ];
        apply_synonym_groups(&mut table, &groups);
        assert_eq!(table.get(0, "state").as_str(), Some("fair"));
        assert!(!table.has_column("condition"));
        assert!(!table.has_column("condición"));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let build = || {
            let mut table = table_of(vec![vec![
                ("a", "1"),
                ("b", "2"),
                ("c", "3"),
            ]]);
            apply_synonym_groups(&mut table, &[SynonymGroup::new("merged", &["b", "c", "a"])]);
            table
        };
        assert_eq!(build(), build());
    }
}
