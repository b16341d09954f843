// City aggregator
// Drives the source adapter once per city, tags origin, concatenates all
// rows into one table and times the full sweep.

use crate::error::PipelineError;
use crate::source::{ListingSource, RawRecord, SearchFilters};
use crate::table::{ListingTable, Value};
use std::time::{Duration, Instant};
use tracing::info;

/// Column the aggregator stamps on every row. Never null by construction.
pub const CITY_COLUMN: &str = "city";

/// Result of one multi-city sweep.
#[derive(Debug)]
pub struct SweepOutcome {
    pub table: ListingTable,
    pub duration: Duration,
}

/// Build one table out of a batch of raw records. Columns are the union of
/// every field seen, in record order; missing fields read as null.
pub fn table_from_records(records: Vec<RawRecord>) -> ListingTable {
    let mut table = ListingTable::new();
    for record in records {
        table.push_row(record);
    }
    table
}

/// Fetch every city in the order given and concatenate the results.
///
/// Row order is fetch order within each city, cities in caller order. A
/// city with zero listings contributes zero rows. The first adapter failure
/// aborts the sweep, tagged with the offending city; no retries here.
pub fn sweep(
    source: &dyn ListingSource,
    cities: &[String],
    category: &str,
    filters: &SearchFilters,
) -> Result<SweepOutcome, PipelineError> {
    let started = Instant::now();
    let mut combined = ListingTable::new();

    for city in cities {
        let records = source
            .fetch(city, category, filters)
            .map_err(|source| PipelineError::Fetch {
                city: city.clone(),
                source,
            })?;
        info!(city = city.as_str(), count = records.len(), "fetched city listings");

        let mut city_table = table_from_records(records);
        for row in 0..city_table.row_count() {
            city_table.set(row, CITY_COLUMN, Value::Str(city.clone()));
        }
        combined.append_table(city_table);
    }

    let duration = started.elapsed();
    info!(
        rows = combined.row_count(),
        columns = combined.column_count(),
        elapsed_ms = duration.as_millis() as u64,
        "sweep complete"
    );
    Ok(SweepOutcome {
        table: combined,
        duration,
    })
}

// ============================================================================
// TESTS
// ============================================================================
