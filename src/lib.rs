// Craigsail - multi-city listing search and normalization
// Core library: record ingestion, attribute expansion, locale/synonym
// reconciliation, type coercion, and persistence sinks.

pub mod aggregate;
pub mod categories;
pub mod error;
pub mod expand;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod sink;
pub mod source;
pub mod table;

// Re-export commonly used types
pub use aggregate::{sweep, SweepOutcome, CITY_COLUMN};
pub use categories::{profile_for, CategoryProfile};
pub use error::{FetchError, PipelineError};
pub use expand::{expand_attributes, ATTRS_COLUMN};
pub use normalize::{apply_backfills, apply_coercions, BackfillRule, CoercionRule, ColumnType};
pub use pipeline::{run, RunConfig, RunOutcome};
pub use reconcile::{apply_synonym_groups, SynonymGroup};
pub use sink::{
    append_sqlite, load_csv, merge_csv_snapshots, open_database, write_csv, write_csv_snapshot,
};
pub use source::{JsonFileSource, ListingSource, RawRecord, SearchFilters};
pub use table::{ListingTable, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
