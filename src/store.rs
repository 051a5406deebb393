//! SQLite persistence gateway.
//!
//! One connection per gateway, opened lazily on first use and kept until
//! [`Gateway::close`]. Bulk inserts run inside a single transaction and are
//! rolled back as a whole on any failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use log::{debug, info, warn};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, Transaction, params, params_from_iter};
use serde::Serialize;

use crate::config::{PragmaSettings, Settings};
use crate::data::{Value, compact_date, parse_naive_date};
use crate::error::PersistenceError;
use crate::registry::DateColumn;
use crate::table::Table;

/// Progress is logged every this many chunks.
const LOG_EVERY_CHUNKS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Create the table when missing, then append.
    Append,
    /// Clear existing rows (creating the table when missing), then insert.
    Replace,
    /// Refuse to write into an existing table.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub exists: bool,
    pub row_count: u64,
    pub date_range: Option<DateRange>,
}

impl TableStats {
    pub fn missing() -> Self {
        Self {
            exists: false,
            row_count: 0,
            date_range: None,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::Boolean(b) => ToSqlOutput::from(*b),
            Value::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => ToSqlOutput::from(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Value::Integer(i)),
        ValueRef::Real(f) => Some(Value::Float(f)),
        ValueRef::Text(bytes) => Some(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => None,
    }
}

/// Double-quotes an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> Result<String, PersistenceError> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(PersistenceError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// SQL expression reducing a stored date of any historical representation
/// (integer `YYYYMMDD[HHMMSS]`, real, or text `YYYY-MM-DD ...`) to an
/// 8-digit integer.
fn normalized_date_expr(quoted_column: &str) -> String {
    format!(
        "CAST(substr(replace(replace(replace(CAST({quoted_column} AS TEXT), '-', ''), '/', ''), '.', ''), 1, 8) AS INTEGER)"
    )
}

fn parse_bound(raw: &str) -> Result<NaiveDate, PersistenceError> {
    parse_naive_date(raw).map_err(|_| PersistenceError::InvalidDate(raw.to_string()))
}

fn format_compact(value: i64) -> Option<String> {
    NaiveDate::from_ymd_opt(
        (value / 10_000) as i32,
        ((value / 100) % 100) as u32,
        (value % 100) as u32,
    )
    .map(|d| d.format("%Y-%m-%d").to_string())
}

fn sql_err(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> PersistenceError {
    let context = context.into();
    move |source| PersistenceError::sqlite(context, source)
}

pub struct Gateway {
    path: PathBuf,
    create_if_missing: bool,
    pragmas: PragmaSettings,
    conn: Option<Connection>,
}

impl Gateway {
    pub fn new(path: impl Into<PathBuf>, create_if_missing: bool, pragmas: PragmaSettings) -> Self {
        Self {
            path: path.into(),
            create_if_missing,
            pragmas,
            conn: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.database_path.clone(),
            settings.create_if_missing,
            settings.pragmas.clone(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection, PersistenceError> {
        if self.conn.is_none() {
            self.conn = Some(self.open()?);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| PersistenceError::DatabaseNotFound {
                path: self.path.clone(),
            })
    }

    fn open(&self) -> Result<Connection, PersistenceError> {
        if !self.create_if_missing && !self.path.exists() {
            return Err(PersistenceError::DatabaseNotFound {
                path: self.path.clone(),
            });
        }
        let conn = Connection::open(&self.path)
            .map_err(sql_err(format!("opening {:?}", self.path)))?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", &self.pragmas.journal_mode, |row| {
                row.get(0)
            })
            .map_err(sql_err("setting journal_mode"))?;
        conn.pragma_update(None, "synchronous", &self.pragmas.synchronous)
            .map_err(sql_err("setting synchronous"))?;
        conn.pragma_update(None, "cache_size", self.pragmas.cache_size)
            .map_err(sql_err("setting cache_size"))?;
        debug!("Opened {:?} (journal_mode={mode})", self.path);
        Ok(conn)
    }

    /// Drops the connection. The next call reopens it.
    pub fn close(&mut self) -> Result<(), PersistenceError> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, source)| PersistenceError::sqlite("closing connection", source))?;
            debug!("Closed {:?}", self.path);
        }
        Ok(())
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool, PersistenceError> {
        let conn = self.connection()?;
        table_exists(conn, table)
    }

    pub fn row_count(&mut self, table: &str) -> Result<u64, PersistenceError> {
        let quoted = quote_ident(table)?;
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {quoted}"), [], |row| row.get(0))
            .map_err(sql_err(format!("counting rows of {table}")))?;
        Ok(count.max(0) as u64)
    }

    /// Existence, row count and (when a date column is given) the covered
    /// date range. A missing table or database yields [`TableStats::missing`];
    /// date-range failures are logged and reported as `None`.
    pub fn table_stats(
        &mut self,
        table: &str,
        date_column: Option<&DateColumn>,
    ) -> Result<TableStats, PersistenceError> {
        let exists = match self.table_exists(table) {
            Ok(exists) => exists,
            Err(PersistenceError::DatabaseNotFound { .. }) => false,
            Err(err) => return Err(err),
        };
        if !exists {
            return Ok(TableStats::missing());
        }
        let row_count = self.row_count(table)?;
        let date_range = match date_column {
            Some(column) if row_count > 0 => match self.date_range(table, column.name) {
                Ok(range) => range,
                Err(err) => {
                    warn!("Date range for {table}.{} unavailable: {err}", column.name);
                    None
                }
            },
            _ => None,
        };
        Ok(TableStats {
            exists,
            row_count,
            date_range,
        })
    }

    fn date_range(&mut self, table: &str, column: &str) -> Result<Option<DateRange>, PersistenceError> {
        let quoted_table = quote_ident(table)?;
        let expr = normalized_date_expr(&quote_ident(column)?);
        let sql = format!(
            "SELECT MIN(d), MAX(d) FROM (SELECT {expr} AS d FROM {quoted_table}) \
             WHERE d BETWEEN 10000101 AND 99991231"
        );
        let conn = self.connection()?;
        let (min, max): (Option<i64>, Option<i64>) = conn
            .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(sql_err(format!("reading date range of {table}.{column}")))?;
        Ok(match (min.and_then(format_compact), max.and_then(format_compact)) {
            (Some(min), Some(max)) => Some(DateRange { min, max }),
            _ => None,
        })
    }

    /// Reads the given columns of every row.
    pub fn read_columns(
        &mut self,
        table: &str,
        columns: &[&str],
    ) -> Result<Vec<Vec<Option<Value>>>, PersistenceError> {
        let quoted_table = quote_ident(table)?;
        let projection = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {projection} FROM {quoted_table}"))
            .map_err(sql_err(format!("reading {table}")))?;
        let rows = stmt
            .query_map([], |row| {
                (0..columns.len())
                    .map(|idx| row.get_ref(idx).map(value_from_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(sql_err(format!("reading {table}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err(format!("reading {table}")))?;
        Ok(rows)
    }

    /// Inserts every row of `records` in chunks of `chunk_size` within one
    /// transaction. `progress` receives the running inserted count after each
    /// chunk.
    pub fn bulk_insert(
        &mut self,
        records: &Table,
        table: &str,
        mode: InsertMode,
        chunk_size: usize,
        progress: &mut dyn FnMut(usize),
    ) -> Result<usize, PersistenceError> {
        let conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(sql_err("beginning insert transaction"))?;
        prepare_table(&tx, records, table, mode)?;
        let inserted = insert_rows(&tx, records, table, chunk_size, progress)?;
        tx.commit().map_err(sql_err(format!("committing insert into {table}")))?;
        info!("Inserted {inserted} row(s) into {table}");
        Ok(inserted)
    }

    /// Deletes rows whose date column falls within `min..=max` (inclusive,
    /// `YYYY-MM-DD` or `YYYYMMDD`). Every stored value is reduced to an
    /// 8-digit day before bounding, whatever its storage class. Returns the
    /// number of rows deleted; a missing table deletes nothing.
    pub fn delete_by_date_range(
        &mut self,
        table: &str,
        column: &str,
        min: &str,
        max: &str,
    ) -> Result<usize, PersistenceError> {
        let conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(sql_err("beginning delete transaction"))?;
        let deleted = delete_range(&tx, table, column, min, max)?;
        tx.commit().map_err(sql_err(format!("committing delete from {table}")))?;
        Ok(deleted)
    }

    /// Replace-on-reupload: deletes the range and inserts `records` in the
    /// same transaction. Returns `(deleted, inserted)`.
    #[allow(clippy::too_many_arguments)]
    pub fn replace_date_range(
        &mut self,
        records: &Table,
        table: &str,
        column: &str,
        min: &str,
        max: &str,
        chunk_size: usize,
        progress: &mut dyn FnMut(usize),
    ) -> Result<(usize, usize), PersistenceError> {
        let conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(sql_err("beginning replace transaction"))?;
        let deleted = delete_range(&tx, table, column, min, max)?;
        prepare_table(&tx, records, table, InsertMode::Append)?;
        let inserted = insert_rows(&tx, records, table, chunk_size, progress)?;
        tx.commit().map_err(sql_err(format!("committing replace on {table}")))?;
        info!("Replaced {min}..{max} in {table}: {deleted} deleted, {inserted} inserted");
        Ok((deleted, inserted))
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, PersistenceError> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(sql_err(format!("checking table {table}")))
}

fn existing_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, PersistenceError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(table)?))
        .map_err(sql_err(format!("describing {table}")))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(sql_err(format!("describing {table}")))?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(sql_err(format!("describing {table}")))?;
    Ok(names)
}

fn column_affinity(values: &[Option<Value>]) -> &'static str {
    match values.iter().flatten().next() {
        Some(Value::Integer(_) | Value::Boolean(_)) => "INTEGER",
        Some(Value::Float(_)) => "REAL",
        _ => "TEXT",
    }
}

fn prepare_table(
    tx: &Transaction<'_>,
    records: &Table,
    table: &str,
    mode: InsertMode,
) -> Result<(), PersistenceError> {
    let quoted = quote_ident(table)?;
    let exists = table_exists(tx, table)?;
    match (mode, exists) {
        (InsertMode::Fail, true) => return Err(PersistenceError::TableExists(table.to_string())),
        (InsertMode::Replace, true) => {
            let cleared = tx
                .execute(&format!("DELETE FROM {quoted}"), [])
                .map_err(sql_err(format!("clearing {table}")))?;
            info!("Cleared {cleared} existing row(s) from {table}");
        }
        _ => {}
    }

    if !exists {
        let definitions = records
            .columns()
            .iter()
            .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, column_affinity(&c.values))))
            .collect::<Result<Vec<_>, PersistenceError>>()?;
        tx.execute(&format!("CREATE TABLE {quoted} ({})", definitions.join(", ")), [])
            .map_err(sql_err(format!("creating {table}")))?;
        info!("Created table {table} with {} column(s)", definitions.len());
        return Ok(());
    }

    let known = existing_columns(tx, table)?;
    for column in records.columns() {
        if !known.contains(&column.name) {
            warn!("Adding column '{}' to existing table {table}", column.name);
            tx.execute(
                &format!(
                    "ALTER TABLE {quoted} ADD COLUMN {} {}",
                    quote_ident(&column.name)?,
                    column_affinity(&column.values)
                ),
                [],
            )
            .map_err(sql_err(format!("adding column {} to {table}", column.name)))?;
        }
    }
    Ok(())
}

fn insert_rows(
    tx: &Transaction<'_>,
    records: &Table,
    table: &str,
    chunk_size: usize,
    progress: &mut dyn FnMut(usize),
) -> Result<usize, PersistenceError> {
    if records.is_empty() || records.width() == 0 {
        return Ok(0);
    }
    let chunk_size = chunk_size.max(1);
    let columns = records
        .columns()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Result<Vec<_>, _>>()?;
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(table)?,
        columns.join(", ")
    );
    let mut stmt = tx
        .prepare_cached(&sql)
        .map_err(sql_err(format!("preparing insert into {table}")))?;

    let total = records.height();
    let chunks = total.div_ceil(chunk_size);
    let mut inserted = 0;
    for (chunk_idx, start) in (0..total).step_by(chunk_size).enumerate() {
        let end = (start + chunk_size).min(total);
        for row in start..end {
            stmt.execute(params_from_iter(records.row(row)))
                .map_err(|source| {
                    PersistenceError::sqlite(format!("inserting row {row} into {table}"), source)
                })?;
        }
        inserted += end - start;
        progress(inserted);
        debug!("Chunk {}/{chunks} written to {table}", chunk_idx + 1);
        if (chunk_idx + 1) % LOG_EVERY_CHUNKS == 0 {
            info!(
                "{table}: {inserted}/{total} row(s) ({:.1}%)",
                inserted as f64 * 100.0 / total as f64
            );
        }
    }
    Ok(inserted)
}

fn delete_range(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    min: &str,
    max: &str,
) -> Result<usize, PersistenceError> {
    let lower = parse_bound(min)?;
    let upper = parse_bound(max)?;
    if !table_exists(tx, table)? {
        debug!("{table} does not exist; nothing to delete");
        return Ok(0);
    }
    let expr = normalized_date_expr(&quote_ident(column)?);
    let to_int = |d: NaiveDate| compact_date(&d.and_time(NaiveTime::MIN));
    let deleted = tx
        .execute(
            &format!("DELETE FROM {} WHERE {expr} BETWEEN ?1 AND ?2", quote_ident(table)?),
            params![to_int(lower), to_int(upper)],
        )
        .map_err(sql_err(format!("deleting {min}..{max} from {table}")))?;
    info!("Deleted {deleted} row(s) from {table} between {min} and {max}");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("근무일").unwrap(), "\"근무일\"");
        assert_eq!(quote_ident("a\"b").unwrap(), "\"a\"\"b\"");
        assert!(quote_ident("  ").is_err());
    }

    #[test]
    fn compact_dates_format_as_iso() {
        assert_eq!(format_compact(20250815).as_deref(), Some("2025-08-15"));
        assert_eq!(format_compact(20251345), None);
    }

    #[test]
    fn affinity_follows_first_value() {
        assert_eq!(column_affinity(&[None, Some(Value::Integer(1))]), "INTEGER");
        assert_eq!(column_affinity(&[Some(Value::Float(1.5))]), "REAL");
        assert_eq!(column_affinity(&[None]), "TEXT");
    }
}
