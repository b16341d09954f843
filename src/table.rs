// Sparse listing table
// Column set is discovered at runtime: every source invents its own fields,
// so rows are maps and the schema is the union of everything seen so far.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// CELL VALUES
// ============================================================================

/// A single cell in a ListingTable.
///
/// Raw records arrive as strings (or lists of strings, for the `attrs`
/// field); the typed variants appear once the normalizer has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    List(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert a JSON value from a raw record file into a cell value.
    ///
    /// Arrays are accepted only as lists of strings (the `attrs` shape);
    /// non-string elements are stringified rather than rejected.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            other => Value::Str(other.to_string()),
        }
    }

    /// Flat text rendering for CSV cells and CLI output. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::List(items) => items.join("; "),
        }
    }
}

static NULL: Value = Value::Null;

// ============================================================================
// LISTING TABLE
// ============================================================================

/// Row-major sparse table with an explicit column order.
///
/// A cell that was never written reads as `Value::Null`; writing `Null`
/// erases the cell. Column order is discovery order, which keeps output
/// deterministic for a given record order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingTable {
    columns: Vec<String>,
    rows: Vec<HashMap<String, Value>>,
}

impl ListingTable {
    pub fn new() -> Self {
        ListingTable::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Register a column without touching any row (cells read as null).
    pub fn ensure_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Append one row; any key not seen before extends the column set.
    pub fn push_row<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut row = HashMap::new();
        for (name, value) in cells {
            self.ensure_column(&name);
            if !value.is_null() {
                row.insert(name, value);
            }
        }
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// Write one cell. The row must already exist; the column need not.
    pub fn set(&mut self, row: usize, column: &str, value: Value) {
        self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            if value.is_null() {
                r.remove(column);
            } else {
                r.insert(column.to_string(), value);
            }
        }
    }

    /// Remove a column everywhere. Returns false if it was not present.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c != name);
        if self.columns.len() == before {
            return false;
        }
        for row in &mut self.rows {
            row.remove(name);
        }
        true
    }

    /// Move every row of `other` onto the end of this table, unioning the
    /// column sets. Row order within each table is preserved.
    pub fn append_table(&mut self, other: ListingTable) {
        for column in &other.columns {
            self.ensure_column(column);
        }
        self.rows.extend(other.rows);
    }

    pub fn iter_column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> {
        (0..self.row_count()).map(move |row| self.get(row, name))
    }

    pub fn column_is_all_null(&self, name: &str) -> bool {
        self.iter_column(name).all(Value::is_null)
    }

    /// Drop every column whose cells are null in all rows. Returns the
    /// removed names. Idempotent: a second pass removes nothing.
    pub fn prune_null_columns(&mut self) -> Vec<String> {
        let dead: Vec<String> = self
            .columns
            .iter()
            .filter(|c| self.column_is_all_null(c))
            .cloned()
            .collect();
        for column in &dead {
            self.drop_column(column);
        }
        dead
    }

    /// Keep only columns whose names contain at least one of the given
    /// substrings, dropping the rest.
    pub fn filter_columns(&mut self, keep_substrings: &[&str]) {
        let dropped: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !keep_substrings.iter().any(|s| c.contains(s)))
            .cloned()
            .collect();
        for column in &dropped {
            self.drop_column(column);
        }
    }

    /// Outer join on a shared key column. Each left row pairs with the
    /// first unconsumed right row carrying an equal key; the right row's
    /// cells fill columns the left row left null. Unmatched right rows are
    /// appended at the end.
    pub fn outer_join(&self, other: &ListingTable, on: &str) -> ListingTable {
        let mut joined = self.clone();
        for column in &other.columns {
            joined.ensure_column(column);
        }

        let mut consumed = vec![false; other.row_count()];
        for left_row in 0..joined.row_count() {
            let key = joined.get(left_row, on).clone();
            if key.is_null() {
                continue;
            }
            let matched = (0..other.row_count())
                .find(|&r| !consumed[r] && *other.get(r, on) == key);
            if let Some(right_row) = matched {
                consumed[right_row] = true;
                for column in &other.columns {
                    if joined.get(left_row, column).is_null() {
                        joined.set(left_row, column, other.get(right_row, column).clone());
                    }
                }
            }
        }

        for right_row in 0..other.row_count() {
            if consumed[right_row] {
                continue;
            }
            let cells: Vec<(String, Value)> = other
                .columns
                .iter()
                .map(|c| (c.clone(), other.get(right_row, c).clone()))
                .collect();
            joined.push_row(cells);
        }

        joined
    }
}

// ============================================================================
// TESTS
// ============================================================================
