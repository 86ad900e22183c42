//! Data access for the dashboard.
//!
//! Every operation opens its own connection and drops it before returning, on both the
//! success and the error path. There is no pool, retry or timeout: a hung statement
//! blocks the caller.
//!
//! `execute` runs caller-supplied SQL verbatim with the configured credentials. There is
//! no allow-list and no read-only guard; whoever can reach the query box can do anything
//! the database user can.

#[cfg(feature = "mysql")]
mod mysql_source;

use crate::config::{AppConfig, Backend, ColumnMapping};
use crate::errors::{AppError, AppResult};
use crate::models::{CellValue, QueryResultTable, RideRecord};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

#[cfg(feature = "mysql")]
pub use self::mysql_source::MysqlSource;

static NULL_CELL: CellValue = CellValue::Null;

pub trait DataSource: Send + Sync {
    fn describe(&self) -> String;

    /// Opens and immediately closes a connection.
    fn check_connection(&self) -> AppResult<()>;

    fn execute(&self, sql: &str) -> AppResult<QueryResultTable>;
}

/// Loads the base table through `source` and coerces each row into a ride record.
pub fn load_base_table(source: &dyn DataSource, mapping: &ColumnMapping) -> AppResult<Vec<RideRecord>> {
    let table = source.execute(&mapping.base_table_sql())?;
    let records = rides_from_table(&table, mapping)?;
    tracing::info!(source = %source.describe(), rows = records.len(), "loaded base table");
    Ok(records)
}

pub fn rides_from_table(table: &QueryResultTable, mapping: &ColumnMapping) -> AppResult<Vec<RideRecord>> {
    let column = |name: &str| {
        table
            .column_index(name)
            .or_else(|| {
                table
                    .columns
                    .iter()
                    .position(|column| column.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| AppError::Query(format!("base table result is missing column '{}'", name)))
    };

    let date = column(&mapping.date)?;
    let booking_id = column(&mapping.booking_id)?;
    let booking_status = column(&mapping.booking_status)?;
    let vehicle_type = column(&mapping.vehicle_type)?;
    let booking_value = column(&mapping.booking_value)?;
    let payment_method = column(&mapping.payment_method)?;
    let ride_distance = column(&mapping.ride_distance)?;
    let driver_ratings = column(&mapping.driver_ratings)?;
    let customer_rating = column(&mapping.customer_rating)?;

    let records = table
        .rows
        .iter()
        .map(|row| {
            let cell = |index: usize| row.get(index).unwrap_or(&NULL_CELL);
            RideRecord {
                date: cell(date).as_datetime(),
                booking_id: cell(booking_id).as_text().unwrap_or_default(),
                booking_status: cell(booking_status).as_text(),
                vehicle_type: cell(vehicle_type).as_text(),
                booking_value: cell(booking_value).as_f64(),
                payment_method: cell(payment_method).as_text(),
                ride_distance: cell(ride_distance).as_f64(),
                driver_rating: cell(driver_ratings).as_f64(),
                customer_rating: cell(customer_rating).as_f64(),
            }
        })
        .collect();

    Ok(records)
}

pub fn open_source(config: &AppConfig) -> AppResult<Box<dyn DataSource>> {
    tracing::debug!(backend = config.database.backend.as_str(), ssl = config.database.ssl, "opening data source");
    match config.database.backend {
        Backend::Sqlite => Ok(Box::new(SqliteSource::new(&config.database.path))),
        #[cfg(feature = "mysql")]
        Backend::Mysql => Ok(Box::new(MysqlSource::new(&config.database))),
        #[cfg(not(feature = "mysql"))]
        Backend::Mysql => Err(AppError::Config(
            "mysql backend requested but this build lacks the `mysql` feature".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Existing database files only; a typo in the path should not silently create one.
    fn connect(&self) -> AppResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(&self.path, flags)
            .map_err(|err| AppError::Connection(format!("{}: {}", self.path.display(), err)))
    }
}

impl DataSource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn check_connection(&self) -> AppResult<()> {
        let conn = self.connect()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|err| AppError::Connection(err.to_string()))
    }

    fn execute(&self, sql: &str) -> AppResult<QueryResultTable> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                cells.push(cell_from_sqlite(row.get_ref(index)?));
            }
            rows.push(cells);
        }

        Ok(QueryResultTable { columns, rows })
    }
}

fn cell_from_sqlite(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(value) => CellValue::Integer(value),
        ValueRef::Real(value) => CellValue::Real(value),
        ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::{load_base_table, rides_from_table, DataSource, SqliteSource};
    use crate::config::ColumnMapping;
    use crate::models::{CellValue, QueryResultTable};
    use rusqlite::Connection;

    fn seeded_db(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("rides.db");
        let conn = Connection::open(&path).expect("create db");
        conn.execute_batch(
            "CREATE TABLE rides (
               date TEXT, booking_id TEXT, booking_status TEXT, vehicle_type TEXT,
               booking_value REAL, payment_method TEXT, ride_distance REAL,
               driver_ratings REAL, customer_rating REAL
             );
             INSERT INTO rides VALUES ('2024-07-01 08:00:00', 'CNR1', 'Success', 'Auto', 100, 'Cash', 5.5, 4.5, 4.0);
             INSERT INTO rides VALUES ('garbage', 'CNR2', 'Canceled by Driver', 'Mini', NULL, NULL, NULL, NULL, NULL);",
        )
        .expect("seed");
        path
    }

    #[test]
    fn execute_returns_columns_in_engine_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = SqliteSource::new(&seeded_db(&dir));
        let table = source
            .execute("SELECT vehicle_type, COUNT(*) AS rides FROM rides GROUP BY vehicle_type ORDER BY vehicle_type")
            .expect("query");
        assert_eq!(table.columns, vec!["vehicle_type", "rides"]);
        assert_eq!(table.rows[0], vec![CellValue::Text("Auto".to_string()), CellValue::Integer(1)]);
    }

    #[test]
    fn syntax_error_is_query_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = SqliteSource::new(&seeded_db(&dir));
        let err = source.execute("SELEC nonsense").expect_err("syntax error");
        assert!(err.to_string().starts_with("QUERY_FAILED"));
    }

    #[test]
    fn missing_database_is_connection_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = SqliteSource::new(&dir.path().join("nope.db"));
        let err = source.check_connection().expect_err("no file");
        assert!(err.to_string().starts_with("CONNECTION_FAILED"));
    }

    #[test]
    fn base_table_coerces_bad_cells_to_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = SqliteSource::new(&seeded_db(&dir));
        let records = load_base_table(&source, &ColumnMapping::lowercase("rides")).expect("load");

        assert_eq!(records.len(), 2);
        assert!(records[0].date.is_some());
        assert_eq!(records[0].booking_value, Some(100.0));
        assert!(records[1].date.is_none());
        assert!(records[1].booking_value.is_none());
        assert!(records[1].payment_method.is_none());
    }

    #[test]
    fn column_lookup_falls_back_to_case_insensitive() {
        let mapping = ColumnMapping::capitalized("rides");
        let table = QueryResultTable {
            columns: mapping.columns().iter().map(|name| name.to_ascii_uppercase()).collect(),
            rows: vec![vec![CellValue::Null; 9]],
        };
        let records = rides_from_table(&table, &mapping).expect("mapped");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = QueryResultTable {
            columns: vec!["date".to_string()],
            rows: Vec::new(),
        };
        let err = rides_from_table(&table, &ColumnMapping::lowercase("rides")).expect_err("missing columns");
        assert!(err.to_string().contains("booking_id"));
    }
}
