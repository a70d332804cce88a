//! Storage-format detection and the manifest loader.
//!
//! [`check_database`] sniffs the SQLite header before anything is opened;
//! the file extension is never trusted. [`load_manifest`] then reads every
//! row of every table into [`RawRow`]s. A table that fails to read is logged
//! and skipped; a row whose columns cannot be decoded is logged and skipped.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};
use crate::models::RawRow;
use crate::value::{Scalar, Value};

/// First 16 bytes of every SQLite 3 database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Rows read from one database plus per-table and per-row failure counts.
#[derive(Debug, Default)]
pub struct LoadedManifest {
    pub rows: Vec<RawRow>,
    pub tables: usize,
    pub failed_tables: usize,
    pub skipped_rows: usize,
}

/// Returns `Ok(())` if `path` is a regular file starting with the SQLite
/// header, a storage error otherwise.
pub fn check_database(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(HarnessError::storage(path, "file does not exist"));
    }
    let mut file = std::fs::File::open(path).map_err(|e| HarnessError::storage(path, e))?;
    let mut header = [0u8; 16];
    file.read_exact(&mut header)
        .map_err(|_| HarnessError::storage(path, "file too short for a database header"))?;
    if &header != SQLITE_HEADER {
        return Err(HarnessError::storage(path, "not a SQLite 3 database"));
    }
    Ok(())
}

/// Non-failing form of [`check_database`].
pub fn is_sqlite(path: &Path) -> bool {
    check_database(path).is_ok()
}

async fn connect_read_only(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| HarnessError::storage(path, e))
}

/// Read every row of every table, ordered by table name then rowid order
/// as SQLite returns it.
pub async fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    check_database(path)?;
    let pool = connect_read_only(path).await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| HarnessError::storage(path, e))?;

    let mut loaded = LoadedManifest {
        tables: tables.len(),
        ..Default::default()
    };

    for table in &tables {
        let rows = match read_table(&pool, table).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %table, error = %e, "failed to read table, skipping");
                loaded.failed_tables += 1;
                continue;
            }
        };

        debug!(table = %table, rows = rows.len(), "read table");
        for (position, row) in rows.iter().enumerate() {
            match decode_row(table, position, row) {
                Ok(raw) => loaded.rows.push(raw),
                Err(e) => {
                    warn!("{}", e);
                    loaded.skipped_rows += 1;
                }
            }
        }
    }

    pool.close().await;

    info!(
        path = %path.display(),
        tables = loaded.tables,
        rows = loaded.rows.len(),
        failed_tables = loaded.failed_tables,
        skipped_rows = loaded.skipped_rows,
        "loaded database"
    );
    Ok(loaded)
}

async fn read_table(pool: &SqlitePool, table: &str) -> std::result::Result<Vec<SqliteRow>, sqlx::Error> {
    let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    sqlx::query(&sql).fetch_all(pool).await
}

fn decode_row(table: &str, position: usize, row: &SqliteRow) -> Result<RawRow> {
    let mut columns = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let value = decode_column(row, idx).map_err(|e| {
            HarnessError::row(format!("{}/#{}", table, position), format!("column {}: {}", idx, e))
        })?;
        columns.push(value);
    }

    let key = columns
        .first()
        .and_then(|v| v.scalar_text().map(|t| t.into_owned()))
        .unwrap_or_else(|| format!("#{}", position));

    Ok(RawRow {
        table: table.to_string(),
        key,
        columns,
    })
}

/// Decode by the stored value's own type, not the declared column type.
fn decode_column(row: &SqliteRow, idx: usize) -> std::result::Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::null());
    }
    let kind = raw.type_info().name().to_ascii_uppercase();

    let value = match kind.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "INT8" | "BOOLEAN" => Value::int(row.try_get::<i64, _>(idx)?),
        "REAL" | "FLOAT" | "DOUBLE" => Value::Scalar(Scalar::Real(row.try_get::<f64, _>(idx)?)),
        "TEXT" => match row.try_get::<String, _>(idx) {
            Ok(s) => Value::text(s),
            // Text columns occasionally carry non-UTF-8 bytes.
            Err(_) => Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        },
        _ => Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
    };
    Ok(value)
}
