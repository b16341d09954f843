// Pipeline entry point
// One run = sweep cities, expand attributes, reconcile synonyms, backfill,
// coerce types, prune dead columns. Configuration is an immutable value;
// adding a city or filter means building a new config, not mutating state
// shared across runs.

use crate::aggregate;
use crate::error::PipelineError;
use crate::expand::{self, ATTRS_COLUMN};
use crate::normalize::{self, BackfillRule, CoercionRule, ColumnType};
use crate::reconcile::{self, SynonymGroup};
use crate::source::{ListingSource, SearchFilters};
use crate::table::ListingTable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

// ============================================================================
// RUN CONFIGURATION
// ============================================================================

/// Everything one pipeline run needs, as a value. The `with_*`/`without_*`
/// builders return fresh configs so a long-lived caller never mutates a
/// config another run might be reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub category: String,
    pub cities: Vec<String>,
    pub filters: SearchFilters,
    pub synonym_groups: Vec<SynonymGroup>,
    pub backfill_rules: Vec<BackfillRule>,
    pub coercion_rules: Vec<CoercionRule>,
}

impl RunConfig {
    /// New config with the stock search filters every run starts from.
    pub fn new(category: impl Into<String>) -> Self {
        let mut filters = SearchFilters::new();
        filters.insert("search_titles".to_string(), serde_json::json!(true));
        filters.insert("has_image".to_string(), serde_json::json!(true));
        filters.insert("bundle_duplicates".to_string(), serde_json::json!(true));
        RunConfig {
            category: category.into(),
            cities: Vec::new(),
            filters,
            synonym_groups: Vec::new(),
            backfill_rules: Vec::new(),
            coercion_rules: Vec::new(),
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        let city = city.into();
        if !self.cities.contains(&city) {
            self.cities.push(city);
        }
        self
    }

    pub fn with_cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for city in cities {
            self = self.with_city(city);
        }
        self
    }

    pub fn without_city(mut self, city: &str) -> Self {
        self.cities.retain(|c| c != city);
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    pub fn without_filter(mut self, key: &str) -> Self {
        self.filters.remove(key);
        self
    }

    pub fn with_synonym_group(mut self, group: SynonymGroup) -> Self {
        self.synonym_groups.push(group);
        self
    }

    pub fn with_synonym_groups(mut self, groups: Vec<SynonymGroup>) -> Self {
        self.synonym_groups.extend(groups);
        self
    }

    pub fn with_backfill_rule(mut self, rule: BackfillRule) -> Self {
        self.backfill_rules.push(rule);
        self
    }

    pub fn with_backfill_rules(mut self, rules: Vec<BackfillRule>) -> Self {
        self.backfill_rules.extend(rules);
        self
    }

    pub fn with_coercion_rule(mut self, column: impl Into<String>, target: ColumnType) -> Self {
        self.coercion_rules.push(CoercionRule::new(column, target));
        self
    }

    pub fn with_coercion_rules(mut self, rules: Vec<CoercionRule>) -> Self {
        self.coercion_rules.extend(rules);
        self
    }

    /// Reject configurations whose outcome would be undefined, before any
    /// fetch happens.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.category.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "category must not be empty".to_string(),
            ));
        }
        if self.cities.is_empty() {
            return Err(PipelineError::Configuration(
                "city set must not be empty".to_string(),
            ));
        }

        let mut canonicals = HashSet::new();
        for group in &self.synonym_groups {
            if !canonicals.insert(group.canonical.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "canonical column '{}' declared by more than one synonym group",
                    group.canonical
                )));
            }
        }
        for group in &self.synonym_groups {
            for source in &group.sources {
                if canonicals.contains(source.as_str()) {
                    return Err(PipelineError::Configuration(format!(
                        "column '{source}' is both a canonical column and a synonym source"
                    )));
                }
            }
        }

        for rule in &self.backfill_rules {
            normalize::compile_pattern(&rule.pattern)?;
        }
        Ok(())
    }
}

// ============================================================================
// RUN
// ============================================================================

/// What a successful run hands back: the normalized table and the wall
/// clock duration of the multi-city sweep.
#[derive(Debug)]
pub struct RunOutcome {
    pub duration: Duration,
    pub table: ListingTable,
}

/// Execute the full pipeline for one category across the configured cities.
///
/// Either returns a fully normalized table, or exactly one typed error
/// naming the stage and city/column that failed. Configuration problems
/// (including unknown cities) surface before the adapter is ever called.
pub fn run(source: &dyn ListingSource, config: &RunConfig) -> Result<RunOutcome, PipelineError> {
    config.validate()?;
    for city in &config.cities {
        if !source.knows_city(city) {
            return Err(PipelineError::Configuration(format!(
                "unknown city '{city}'"
            )));
        }
    }

    let sweep = aggregate::sweep(source, &config.cities, &config.category, &config.filters)?;
    let mut table = sweep.table;

    expand::expand_attributes(&mut table, ATTRS_COLUMN);
    reconcile::apply_synonym_groups(&mut table, &config.synonym_groups);
    normalize::apply_backfills(&mut table, &config.backfill_rules)?;
    normalize::apply_coercions(&mut table, &config.coercion_rules)?;
    let pruned = table.prune_null_columns();

    info!(
        category = config.category.as_str(),
        rows = table.row_count(),
        columns = table.column_count(),
        pruned = pruned.len(),
        "pipeline run complete"
    );
    Ok(RunOutcome {
        duration: sweep.duration,
        table,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::source::RawRecord;
    use crate::table::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock adapter with canned per-city records and a fetch call counter.
    struct MockSource {
        per_city: Vec<(String, Vec<RawRecord>)>,
        fetch_calls: AtomicUsize,
    }

    impl MockSource {
        fn new(per_city: Vec<(&str, Vec<RawRecord>)>) -> Self {
            MockSource {
                per_city: per_city
                    .into_iter()
                    .map(|(city, records)| (city.to_string(), records))
                    .collect(),
                fetch_calls: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    impl ListingSource for MockSource {
        fn fetch(
            &self,
            city: &str,
            _category: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<RawRecord>, FetchError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .per_city
                .iter()
                .find(|(c, _)| c == city)
                .map(|(_, records)| records.clone())
                .unwrap_or_default())
        }

        fn knows_city(&self, city: &str) -> bool {
            self.per_city.iter().any(|(c, _)| c == city)
        }
    }

    fn attrs(entries: &[&str]) -> Value {
        Value::List(entries.iter().map(|e| e.to_string()).collect())
    }

    fn two_city_source() -> MockSource {
        MockSource::new(vec![
            (
                "city_a",
                vec![RawRecord::new()
                    .with_field("name", Value::Str("Boat 1999".into()))
                    .with_field("attrs", attrs(&["mfg_year:1999", "condición:good"]))
                    .with_field("price", Value::Str("$500".into()))
                    .with_field("repost_of", Value::Null)],
            ),
            (
                "city_b",
                vec![RawRecord::new()
                    .with_field("name", Value::Str("Boat 2005".into()))
                    .with_field("attrs", attrs(&["año de fabricación:2005"]))
                    .with_field("price", Value::Str("$700".into()))],
            ),
        ])
    }

    fn two_city_config() -> RunConfig {
        RunConfig::new("boo")
            .with_cities(["city_a", "city_b"])
            .with_synonym_group(SynonymGroup::new(
                "year manufactured",
                &["mfg_year", "año de fabricación"],
            ))
            .with_synonym_group(SynonymGroup::new("condition", &["condición"]))
            .with_coercion_rule("price", ColumnType::Float)
    }

    #[test]
    fn test_end_to_end_two_cities() {
        let source = two_city_source();
        let outcome = run(&source, &two_city_config()).unwrap();
        let table = outcome.table;

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "year manufactured").as_str(), Some("1999"));
        assert_eq!(table.get(1, "year manufactured").as_str(), Some("2005"));
        assert_eq!(table.get(0, "condition").as_str(), Some("good"));
        assert!(table.get(1, "condition").is_null());
        assert_eq!(table.get(0, "price"), &Value::Float(500.0));
        assert_eq!(table.get(1, "price"), &Value::Float(700.0));
        assert_eq!(table.get(0, "city").as_str(), Some("city_a"));
        assert_eq!(table.get(1, "city").as_str(), Some("city_b"));

        for gone in ["mfg_year", "año de fabricación", "condición", "attrs"] {
            assert!(!table.has_column(gone), "column '{gone}' should be gone");
        }
        // repost_of was null everywhere: pruned
        assert!(!table.has_column("repost_of"));
    }

    #[test]
    fn test_empty_city_set_errors_before_any_fetch() {
        let source = two_city_source();
        let config = RunConfig::new("boo");

        let err = run(&source, &config).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_unknown_city_errors_before_any_fetch() {
        let source = two_city_source();
        let config = RunConfig::new("boo").with_cities(["city_a", "atlantis"]);

        let err = run(&source, &config).unwrap_err();
        match err {
            PipelineError::Configuration(message) => assert!(message.contains("atlantis")),
            other => panic!("expected configuration error, got: {other}"),
        }
        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_conversion_failure_aborts_the_run() {
        let source = MockSource::new(vec![(
            "city_a",
            vec![RawRecord::new().with_field("price", Value::Str("call me".into()))],
        )]);
        let config = RunConfig::new("boo")
            .with_city("city_a")
            .with_coercion_rule("price", ColumnType::Float);

        let err = run(&source, &config).unwrap_err();
        assert!(matches!(err, PipelineError::Conversion { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_canonicals() {
        let config = RunConfig::new("boo")
            .with_city("city_a")
            .with_synonym_group(SynonymGroup::new("condition", &["condición"]))
            .with_synonym_group(SynonymGroup::new("condition", &["zustand"]));
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_canonical_used_as_source() {
        let config = RunConfig::new("boo")
            .with_city("city_a")
            .with_synonym_group(SynonymGroup::new("condition", &["condición"]))
            .with_synonym_group(SynonymGroup::new("state", &["condition"]));
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_builders_produce_new_values() {
        let base = RunConfig::new("boo").with_city("city_a");
        let grown = base.clone().with_city("city_b").with_filter(
            "min_price",
            serde_json::json!(1000),
        );
        let shrunk = grown.clone().without_city("city_a").without_filter("min_price");

        assert_eq!(base.cities, vec!["city_a"]);
        assert_eq!(grown.cities, vec!["city_a", "city_b"]);
        assert_eq!(shrunk.cities, vec!["city_b"]);
        assert!(grown.filters.contains_key("min_price"));
        assert!(!shrunk.filters.contains_key("min_price"));
        // Stock filters survive unless explicitly removed
        assert!(base.filters.contains_key("has_image"));
    }

    #[test]
    fn test_aggregator_row_count_matches_sum_of_cities() {
        let source = MockSource::new(vec![
            (
                "city_a",
                vec![
                    RawRecord::new().with_field("name", Value::Str("one".into())),
                    RawRecord::new().with_field("name", Value::Str("two".into())),
                ],
            ),
            ("city_b", vec![]),
            (
                "city_c",
                vec![RawRecord::new().with_field("name", Value::Str("three".into()))],
            ),
        ]);
        let config = RunConfig::new("boo").with_cities(["city_a", "city_b", "city_c"]);

        let outcome = run(&source, &config).unwrap();
        assert_eq!(outcome.table.row_count(), 3);
        assert_eq!(source.fetch_count(), 3);
    }
}
