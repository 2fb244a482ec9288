use crate::query::{
    create_table_sql, insert_sql, select_sql, update_sql, RowUpdate, SelectedRow, Selection,
    SqlValue,
};
use formfunnel_core::{FormFunnelError, ParsedRow, TableSchema};
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Location of the database file. Cheap to clone; every request opens its
/// own [`Database`] and closes it when done.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn open(&self) -> Result<Database, FormFunnelError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
        debug!("connected to database {}", self.path.display());
        Ok(Database { pool })
    }
}

/// An open connection to the store. Dropping it also releases the
/// connection, but [`Database::close`] waits for that to finish.
#[derive(Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn create_table(&self, schema: &TableSchema) -> Result<(), FormFunnelError> {
        let sql = create_table_sql(schema)?;
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
        debug!("created table {} if it did not exist", schema.name);
        Ok(())
    }

    /// Inserts one parsed row. Absent slots are stored as NULL, which lets
    /// SQLite assign `INTEGER PRIMARY KEY` columns.
    pub async fn insert_row(&self, table: &str, row: &ParsedRow) -> Result<u64, FormFunnelError> {
        if row.columns.len() != row.rows.len() {
            return Err(FormFunnelError::Storage(format!(
                "row for {table} has {} columns but {} values",
                row.columns.len(),
                row.rows.len()
            )));
        }
        let sql = insert_sql(table, &row.columns)?;
        let mut query = sqlx::query(&sql);
        for slot in &row.rows {
            query = bind_value(query, SqlValue::from_slot(slot)?);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
        info!(
            "inserted {} row(s) into {} ({})",
            result.rows_affected(),
            table,
            row.columns.join(",")
        );
        Ok(result.rows_affected())
    }

    pub async fn update_rows(
        &self,
        table: &str,
        updates: &[RowUpdate],
    ) -> Result<u64, FormFunnelError> {
        let mut rows_affected = 0;
        for update in updates {
            let sql = update_sql(table, update)?;
            let mut query = sqlx::query(&sql);
            for (_, value) in &update.set {
                query = bind_value(query, SqlValue::from_json(value)?);
            }
            query = bind_value(query, SqlValue::from_json(&update.filter.value)?);
            let result = query
                .execute(&self.pool)
                .await
                .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
            rows_affected += result.rows_affected();
        }
        info!("updated {} row(s) in {}", rows_affected, table);
        Ok(rows_affected)
    }

    pub async fn select_one(
        &self,
        table: &str,
        selection: &Selection,
    ) -> Result<Option<SelectedRow>, FormFunnelError> {
        let sql = select_sql(table, selection)?;
        let mut query = sqlx::query(&sql);
        for condition in selection.conditions() {
            query = bind_value(query, SqlValue::from_json(&condition.value)?);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
        debug!("selected from {}: found={}", table, row.is_some());
        row.map(|row| decode_row(&row, &selection.columns))
            .transpose()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn bind_value(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    }
}

fn decode_row(row: &SqliteRow, columns: &[String]) -> Result<SelectedRow, FormFunnelError> {
    let mut values = Vec::with_capacity(columns.len());
    for idx in 0..columns.len() {
        let raw = row
            .try_get_raw(idx)
            .map_err(|e| FormFunnelError::Storage(e.to_string()))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" => row.try_get::<i64, _>(idx).map(Value::from),
                "REAL" => row.try_get::<f64, _>(idx).map(Value::from),
                _ => row.try_get::<String, _>(idx).map(Value::from),
            }
            .map_err(|e| FormFunnelError::Storage(e.to_string()))?
        };
        values.push(value);
    }
    Ok(SelectedRow {
        columns: columns.to_vec(),
        values,
    })
}
