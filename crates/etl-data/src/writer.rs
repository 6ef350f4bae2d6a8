//! Persistence sinks for the pipeline outputs.
//!
//! Two sinks are provided: a directory of CSV files and a SQLite database.
//! Both replace whatever a previous run left behind.

use std::path::{Path, PathBuf};

use etl_core::error::{EtlError, Result};
use etl_core::models::{Table, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use tracing::info;

/// Destination for the finished output tables.
pub trait TableSink {
    /// Short label used in log events.
    fn label(&self) -> String;

    /// Persist every table, replacing earlier contents of the same name.
    fn write_tables(&self, tables: &[&Table]) -> Result<()>;
}

// ── CsvSink ───────────────────────────────────────────────────────────────────

/// Writes each table to `<dir>/<table name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, table: &Table) -> PathBuf {
        self.dir.join(format!("{}.csv", table.name()))
    }

    fn staging_path_for(&self, table: &Table) -> PathBuf {
        self.dir.join(format!(".{}.csv.tmp", table.name()))
    }

    fn write_one(&self, table: &Table, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(Value::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn stage_all(&self, tables: &[&Table]) -> Result<()> {
        for table in tables {
            self.write_one(table, &self.staging_path_for(table))?;
        }
        Ok(())
    }
}

impl TableSink for CsvSink {
    fn label(&self) -> String {
        format!("csv:{}", self.dir.display())
    }

    /// Stages every table next to its target and renames them into place
    /// only after all were written, so earlier files survive a failed write.
    fn write_tables(&self, tables: &[&Table]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        if let Err(err) = self.stage_all(tables) {
            for table in tables {
                let _ = std::fs::remove_file(self.staging_path_for(table));
            }
            return Err(err);
        }
        for table in tables {
            let path = self.path_for(table);
            std::fs::rename(self.staging_path_for(table), &path)?;
            info!(path = %path.display(), rows = table.len(), "Wrote CSV");
        }
        Ok(())
    }
}

// ── SqliteSink ────────────────────────────────────────────────────────────────

/// Writes each table into a SQLite database, dropping any previous version.
///
/// All tables are replaced in a single transaction.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL type for a column, taken from its first present value.
fn column_sql_type(table: &Table, idx: usize) -> &'static str {
    let first = table
        .rows()
        .iter()
        .map(|row| &row[idx])
        .find(|v| !v.is_missing());
    match first {
        Some(Value::Bool(_)) | Some(Value::Int(_)) => "INTEGER",
        Some(Value::Float(_)) => "REAL",
        _ => "TEXT",
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Missing => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Str(s) => SqlValue::Text(s.clone()),
        Value::DateTime(_) => SqlValue::Text(value.to_string()),
    }
}

fn replace_table(conn: &Connection, table: &Table) -> Result<()> {
    let name = quote_ident(table.name());
    conn.execute(&format!("DROP TABLE IF EXISTS {name}"), [])?;

    let column_defs: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} {}", quote_ident(c), column_sql_type(table, i)))
        .collect();
    conn.execute(
        &format!("CREATE TABLE {name} ({})", column_defs.join(", ")),
        [],
    )?;

    let placeholders = vec!["?"; table.width()].join(", ");
    let mut stmt = conn.prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))?;
    for row in table.rows() {
        stmt.execute(rusqlite::params_from_iter(row.iter().map(to_sql_value)))?;
    }
    Ok(())
}

impl TableSink for SqliteSink {
    fn label(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn write_tables(&self, tables: &[&Table]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;
        for table in tables {
            if table.width() == 0 {
                return Err(EtlError::Config(format!(
                    "cannot persist table '{}' without columns",
                    table.name()
                )));
            }
            replace_table(&tx, table)?;
            info!(table = table.name(), rows = table.len(), "Replaced SQLite table");
        }
        tx.commit()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
