use crate::datatype::ExpectedType;
use crate::error::FormFunnelError;
use crate::types::ColumnSchema;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Protected columns assumed for schema files written as a bare column list.
pub const DEFAULT_PROTECTED: [&str; 2] = ["verification_token", "autokey"];

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub protected: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableFile {
    Described {
        fields: Vec<ColumnSchema>,
        #[serde(default)]
        protected: Vec<String>,
    },
    Columns(Vec<ColumnSchema>),
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        protected: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            protected: protected.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a table from a bare column list, protecting [`DEFAULT_PROTECTED`].
    pub fn with_default_protection(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self::new(name, columns, DEFAULT_PROTECTED)
    }

    pub fn from_json(name: &str, json: &str) -> Result<Self, FormFunnelError> {
        let file: TableFile = serde_json::from_str(json)
            .map_err(|e| FormFunnelError::Schema(format!("table {name}: {e}")))?;
        let schema = match file {
            TableFile::Described { fields, protected } => Self::new(name, fields, protected),
            TableFile::Columns(columns) => Self::with_default_protection(name, columns),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_path(name: &str, path: impl AsRef<Path>) -> Result<Self, FormFunnelError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FormFunnelError::Schema(format!("{}: {e}", path.display())))?;
        Self::from_json(name, &contents)
    }

    pub fn is_protected(&self, column: &str) -> bool {
        self.protected.contains(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.column.as_str())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.column == column)
    }

    /// Rejects empty tables and duplicate column names. Undetermined
    /// datatypes and dangling protected names are only warned about, since
    /// the parser already treats them as never writable.
    pub fn validate(&self) -> Result<(), FormFunnelError> {
        if self.columns.is_empty() {
            return Err(FormFunnelError::Schema(format!(
                "table {} has no columns",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.columns {
            if !seen.insert(field.column.as_str()) {
                return Err(FormFunnelError::Schema(format!(
                    "table {} declares column {} twice",
                    self.name, field.column
                )));
            }
            if ExpectedType::from_datatype(&field.datatype) == ExpectedType::Undetermined
                && !self.is_protected(&field.column)
            {
                warn!(
                    table = %self.name,
                    column = %field.column,
                    datatype = %field.datatype,
                    "column datatype is neither TEXT nor INTEGER; request data will never fill it"
                );
            }
        }
        for name in &self.protected {
            if !self.has_column(name) {
                warn!(table = %self.name, column = %name, "protected column not in table");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, TableSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Loads every `(name, path)` pair into a fresh catalog.
    pub fn load<'a, I>(entries: I) -> Result<Self, FormFunnelError>
    where
        I: IntoIterator<Item = (&'a str, &'a Path)>,
    {
        let mut catalog = Self::new();
        for (name, path) in entries {
            let schema = TableSchema::from_path(name, path)?;
            info!(
                "loaded table {} ({} columns) from {}",
                name,
                schema.columns.len(),
                path.display()
            );
            catalog.register(schema)?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, schema: TableSchema) -> Result<(), FormFunnelError> {
        if self.tables.contains_key(&schema.name) {
            return Err(FormFunnelError::Schema(format!(
                "table already registered: {}",
                schema.name
            )));
        }
        self.tables.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema, FormFunnelError> {
        self.get_table(name)
            .ok_or_else(|| FormFunnelError::Schema(format!("unknown table: {name}")))
    }

    pub fn list_tables(&self) -> Vec<TableSchema> {
        self.tables.values().cloned().collect()
    }
}
