//! In-memory tables and their buffer encoding
//!
//! A [`Table`] is an ordered list of columns plus rows that each carry exactly
//! that column set. Tables travel between stages as a single JSON string:
//!
//! ```json
//! {"columns":["name","age"],"records":[{"name":"john smith","age":30}]}
//! ```

use crate::error::PipelineError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single table cell
///
/// Numbers keep the integer/float distinction of their source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Boolean(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// One row, keyed by column name in column order
pub type Row = IndexMap<String, Cell>;

/// A rectangular table with a fixed, ordered column set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table, rejecting empty or duplicated column names
    pub fn new(columns: Vec<String>) -> Result<Self, String> {
        for (i, name) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(format!("column {} has an empty name", i + 1));
            }
            if columns[..i].contains(name) {
                return Err(format!("duplicate column '{}'", name));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Append a row given in column order
    pub fn push_cells(&mut self, cells: Vec<Cell>) -> Result<(), String> {
        if cells.len() != self.columns.len() {
            return Err(format!(
                "row {} has {} cells, expected {}",
                self.rows.len() + 1,
                cells.len(),
                self.columns.len()
            ));
        }
        let row = self.columns.iter().cloned().zip(cells).collect();
        self.rows.push(row);
        Ok(())
    }

    /// Append a keyed row; the key set must equal the column set
    ///
    /// The row is reordered to column order.
    pub fn push_row(&mut self, mut row: Row) -> Result<(), String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "row {} has {} fields, expected {}",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            ));
        }
        let mut ordered = Row::with_capacity(self.columns.len());
        for column in &self.columns {
            let cell = row.shift_remove(column).ok_or_else(|| {
                format!("row {} is missing column '{}'", self.rows.len() + 1, column)
            })?;
            ordered.insert(column.clone(), cell);
        }
        self.rows.push(ordered);
        Ok(())
    }

    /// Apply `f` to every cell, keeping the table shape
    pub fn try_map_cells<F, E>(self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(Cell) -> Result<Cell, E>,
    {
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(k, v)| f(v).map(|v| (k, v)))
                    .collect::<Result<Row, E>>()
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            columns: self.columns,
            rows,
        })
    }
}

#[derive(Serialize)]
struct EncodedTable<'a> {
    columns: &'a [String],
    records: &'a [Row],
}

#[derive(Deserialize)]
struct DecodedTable {
    columns: Vec<String>,
    records: Vec<Row>,
}

/// Encode a table as the string stored in the buffer
pub fn encode(table: &Table) -> Result<String, PipelineError> {
    serde_json::to_string(&EncodedTable {
        columns: &table.columns,
        records: &table.rows,
    })
    .map_err(|e| PipelineError::Serialization(e.to_string()))
}

/// Decode a buffer value back into a table
///
/// Fails if the JSON is malformed or any record breaks the column set. The
/// caller decides which error kind this becomes.
pub fn decode(encoded: &str) -> Result<Table, String> {
    let decoded: DecodedTable =
        serde_json::from_str(encoded).map_err(|e| format!("invalid table JSON: {}", e))?;

    let mut table = Table::new(decoded.columns)?;
    table.rows.reserve(decoded.records.len());
    for record in decoded.records {
        table.push_row(record)?;
    }
    Ok(table)
}
