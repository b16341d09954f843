// Persistence sinks
// Flat CSV snapshots (one per day) and an append-only SQLite table. The
// schema is whatever survived the pipeline, so both sinks are built from
// the table's live column set rather than a fixed layout.

use crate::table::{ListingTable, Value};
use anyhow::{bail, Context, Result};
use chrono::Local;
use rusqlite::{params_from_iter, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// CSV
// ============================================================================

/// Write a date-stamped CSV snapshot (`<prefix><YYYY-MM-DD>.csv`) into the
/// given directory. Returns the path written.
pub fn write_csv_snapshot(table: &ListingTable, dir: &Path, prefix: &str) -> Result<PathBuf> {
    let filename = format!("{prefix}{}.csv", Local::now().format("%Y-%m-%d"));
    let path = dir.join(filename);
    write_csv(table, &path)?;
    Ok(path)
}

pub fn write_csv(table: &ListingTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create CSV file {}", path.display()))?;

    writer.write_record(table.columns())?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|column| table.get(row, column).render())
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = table.row_count(), "wrote CSV snapshot");
    Ok(())
}

/// Load a CSV back into a table. Every cell comes back as a string;
/// empty cells read as null.
pub fn load_csv(path: &Path) -> Result<ListingTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open CSV file {}", path.display()))?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut table = ListingTable::new();
    for header in &headers {
        table.ensure_column(header);
    }
    for record in reader.records() {
        let record = record?;
        table.push_row(headers.iter().zip(record.iter()).map(|(header, field)| {
            let value = if field.is_empty() {
                Value::Null
            } else {
                Value::Str(field.to_string())
            };
            (header.clone(), value)
        }));
    }
    Ok(table)
}

/// Load every CSV snapshot in a directory and outer-join them on a shared
/// key column, oldest path first. `keep_substrings`, when non-empty,
/// filters the merged column set the same way `ListingTable::filter_columns`
/// does.
pub fn merge_csv_snapshots(
    dir: &Path,
    merge_column: &str,
    keep_substrings: &[&str],
) -> Result<ListingTable> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read snapshot directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no CSV snapshots found in {}", dir.display());
    }

    let mut merged = load_csv(&paths[0])?;
    if !merged.has_column(merge_column) {
        bail!(
            "merge column '{merge_column}' not present in {}",
            paths[0].display()
        );
    }
    for path in &paths[1..] {
        let snapshot = load_csv(path)?;
        merged = merged.outer_join(&snapshot, merge_column);
    }

    if !keep_substrings.is_empty() {
        merged.filter_columns(keep_substrings);
    }
    Ok(merged)
}

// ============================================================================
// SQLITE
// ============================================================================

/// Open (or create) the tracking database with WAL enabled.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Append every row to a SQLite table, creating the table from the
/// ListingTable's dynamic schema on first use.
pub fn append_sqlite(conn: &Connection, table: &ListingTable, table_name: &str) -> Result<()> {
    if table.column_count() == 0 {
        bail!("refusing to persist a table with no columns");
    }

    let column_defs: Vec<String> = table
        .columns()
        .iter()
        .map(|column| format!("{} {}", quote_ident(column), sql_type(table, column)))
        .collect();
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table_name),
            column_defs.join(", ")
        ),
        [],
    )?;

    let column_list: Vec<String> = table.columns().iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=table.column_count()).map(|i| format!("?{i}")).collect();
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table_name),
        column_list.join(", "),
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&insert)?;
    for row in 0..table.row_count() {
        let values = table
            .columns()
            .iter()
            .map(|column| sql_value(table.get(row, column)));
        stmt.execute(params_from_iter(values))?;
    }
    info!(table = table_name, rows = table.row_count(), "appended rows to SQLite");
    Ok(())
}

/// Column names come straight from scraped attribute keys, so anything
/// goes: quote and escape.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Pick a column affinity from the first non-null value.
fn sql_type(table: &ListingTable, column: &str) -> &'static str {
    match table.iter_column(column).find(|v| !v.is_null()) {
        Some(Value::Int(_)) | Some(Value::Bool(_)) => "INTEGER",
        Some(Value::Float(_)) => "REAL",
        _ => "TEXT",
    }
}

fn sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Str(s) => Sql::Text(s.clone()),
        Value::Int(i) => Sql::Integer(*i),
        Value::Float(f) => Sql::Real(*f),
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::DateTime(dt) => Sql::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::List(items) => Sql::Text(items.join("; ")),
    }
}

// ============================================================================
// TESTS
// ============================================================================
