//! Tabular per-device series.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

/// Default label for the leading timestamp column.
pub const TIMESTAMP_LABEL: &str = "ts";

/// One table row: a timestamp plus one optional cell per channel column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub ts: DateTime<FixedOffset>,
    pub values: Vec<Option<f64>>,
}

/// An ordered series table for one device.
///
/// Column 0 is always the timestamp; the remaining columns are channels in
/// first-seen order. Cells are `None` where a channel reported no sample at
/// that timestamp (outer-join semantics).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceTable {
    timestamp_label: String,
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl DeviceTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self::with_label(TIMESTAMP_LABEL, columns)
    }

    pub fn with_label(timestamp_label: &str, columns: Vec<String>) -> Self {
        Self {
            timestamp_label: timestamp_label.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn timestamp_label(&self) -> &str {
        &self.timestamp_label
    }

    /// Channel column names, excluding the leading timestamp column.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Total column count including the timestamp column.
    pub fn column_count(&self) -> usize {
        1 + self.columns.len()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamp(&self, row: usize) -> Option<DateTime<FixedOffset>> {
        self.rows.get(row).map(|r| r.ts)
    }

    /// Cell lookup by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.values.get(col).copied().flatten()
    }

    /// Append a row. Short value vectors are padded with `None`.
    pub fn push_row(&mut self, ts: DateTime<FixedOffset>, mut values: Vec<Option<f64>>) {
        values.resize(self.columns.len(), None);
        self.rows.push(TableRow { ts, values });
    }

    /// Stable sort by timestamp ascending. Duplicate timestamps are kept in
    /// insertion order, never collapsed.
    pub fn sort_by_timestamp(&mut self) {
        self.rows.sort_by_key(|r| r.ts);
    }

    /// Keep only rows with `from <= ts < to`.
    pub fn retain_range(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) {
        self.rows.retain(|r| r.ts >= from && r.ts < to);
    }

    /// Union-merge another table into this one (outer join on column names).
    ///
    /// Columns unseen so far are appended in the other table's order; all
    /// rows are remapped into the merged column layout. Row order is the
    /// concatenation; callers wanting time order sort afterwards.
    pub fn merge_union(&mut self, other: DeviceTable) {
        for name in &other.columns {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.clone());
            }
        }
        for row in &mut self.rows {
            row.values.resize(self.columns.len(), None);
        }

        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .unwrap_or(self.columns.len() - 1) // unreachable: inserted above
            })
            .collect();

        for row in other.rows {
            let mut values = vec![None; self.columns.len()];
            for (src, dst) in mapping.iter().enumerate() {
                values[*dst] = row.values.get(src).copied().flatten();
            }
            self.rows.push(TableRow { ts: row.ts, values });
        }
    }
}
