use crate::catalog::TableSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped request body, as decoded from JSON.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSchema {
    pub column: String,
    pub datatype: String,
}

impl ColumnSchema {
    pub fn new(column: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            datatype: datatype.into(),
        }
    }
}

/// One cell of a parsed row. `Absent` is the missing marker: the value was
/// protected, mistyped, not supplied, or the column type is unrecognized.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Present(Value),
    Absent,
}

impl Slot {
    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Slot::Present(value) => Some(value),
            Slot::Absent => None,
        }
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Slot::Present(value)
    }
}

/// A row aligned to a table schema. `columns[i]` names `rows[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub columns: Vec<String>,
    pub rows: Vec<Slot>,
}

impl ParsedRow {
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn get(&self, column: &str) -> Option<&Slot> {
        self.position(column).map(|idx| &self.rows[idx])
    }

    /// Overlays a value for `column`. Returns false if the row has no such column.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> bool {
        match self.position(column) {
            Some(idx) => {
                self.rows[idx] = Slot::Present(value.into());
                true
            }
            None => false,
        }
    }

    /// Unprotected columns of `table` whose slot is still `Absent`.
    pub fn missing_columns<'a>(&'a self, table: &TableSchema) -> Vec<&'a str> {
        self.columns
            .iter()
            .zip(self.rows.iter())
            .filter(|(column, slot)| slot.is_absent() && !table.is_protected(column))
            .map(|(column, _)| column.as_str())
            .collect()
    }

    pub fn is_complete(&self, table: &TableSchema) -> bool {
        self.missing_columns(table).is_empty()
    }
}
