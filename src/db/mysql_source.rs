use super::DataSource;
use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{CellValue, QueryResultTable};
use chrono::NaiveDate;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, SslOpts, Value};

/// MySQL-compatible server (MySQL, MariaDB, TiDB). `ssl` turns on TLS with default
/// verification, which serverless cloud gateways require.
#[derive(Debug, Clone)]
pub struct MysqlSource {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    database: String,
    ssl: bool,
}

impl MysqlSource {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.resolve_password(),
            database: config.database.clone(),
            ssl: config.ssl,
        }
    }

    fn opts(&self) -> Opts {
        let mut builder = OptsBuilder::new()
            .ip_or_hostname(Some(self.host.clone()))
            .tcp_port(self.port)
            .user(Some(self.user.clone()))
            .pass(self.password.clone())
            .db_name(Some(self.database.clone()));
        if self.ssl {
            builder = builder.ssl_opts(Some(SslOpts::default()));
        }
        Opts::from(builder)
    }

    fn connect(&self) -> AppResult<Conn> {
        Conn::new(self.opts()).map_err(|err| AppError::Connection(format!("{}:{}: {}", self.host, self.port, err)))
    }
}

impl DataSource for MysqlSource {
    fn describe(&self) -> String {
        format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }

    fn check_connection(&self) -> AppResult<()> {
        let mut conn = self.connect()?;
        conn.query_drop("SELECT 1")
            .map_err(|err| AppError::Connection(err.to_string()))
    }

    fn execute(&self, sql: &str) -> AppResult<QueryResultTable> {
        let mut conn = self.connect()?;
        let mut result = conn.query_iter(sql)?;
        let columns = result
            .columns()
            .as_ref()
            .iter()
            .map(|column| column.name_str().into_owned())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for row in result.by_ref() {
            let row = row?;
            let cells = (0..row.len())
                .map(|index| row.as_ref(index).map(cell_from_mysql).unwrap_or(CellValue::Null))
                .collect();
            rows.push(cells);
        }

        Ok(QueryResultTable { columns, rows })
    }
}

fn cell_from_mysql(value: &Value) -> CellValue {
    match value {
        Value::NULL => CellValue::Null,
        Value::Bytes(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(value) => CellValue::Integer(*value),
        Value::UInt(value) => i64::try_from(*value)
            .map(CellValue::Integer)
            .unwrap_or(CellValue::Real(*value as f64)),
        Value::Float(value) => CellValue::Real(f64::from(*value)),
        Value::Double(value) => CellValue::Real(*value),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .and_then(|date| {
                    date.and_hms_micro_opt(u32::from(*hour), u32::from(*minute), u32::from(*second), *micros)
                })
                .map(CellValue::Timestamp)
                .unwrap_or(CellValue::Null)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = u64::from(*days) * 24 + u64::from(*hours);
            CellValue::Text(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                if *negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds,
                micros
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{cell_from_mysql, MysqlSource};
    use crate::config::DatabaseConfig;
    use crate::models::CellValue;
    use mysql::Value;

    fn source(ssl: bool) -> MysqlSource {
        MysqlSource::new(&DatabaseConfig {
            host: "gateway.example.com".to_string(),
            port: 4000,
            user: "analyst".to_string(),
            password: Some("pw".to_string()),
            database: "ola".to_string(),
            ssl,
            ..DatabaseConfig::default()
        })
    }

    #[test]
    fn ssl_flag_turns_on_tls() {
        assert!(source(true).opts().get_ssl_opts().is_some());
        assert!(source(false).opts().get_ssl_opts().is_none());
    }

    #[test]
    fn opts_carry_connection_settings() {
        let opts = source(false).opts();
        assert_eq!(opts.get_ip_or_hostname(), "gateway.example.com");
        assert_eq!(opts.get_tcp_port(), 4000);
        assert_eq!(opts.get_user(), Some("analyst"));
        assert_eq!(opts.get_pass(), Some("pw"));
        assert_eq!(opts.get_db_name(), Some("ola"));
    }

    #[test]
    fn date_values_become_timestamps() {
        let cell = cell_from_mysql(&Value::Date(2024, 7, 2, 18, 45, 0, 0));
        let CellValue::Timestamp(value) = &cell else {
            panic!("expected timestamp, got {:?}", cell);
        };
        assert_eq!(value.to_string(), "2024-07-02 18:45:00");
        assert_eq!(cell_from_mysql(&Value::Date(2024, 2, 30, 0, 0, 0, 0)), CellValue::Null);
    }

    #[test]
    fn scalar_values_map_to_cells() {
        assert_eq!(cell_from_mysql(&Value::UInt(7)), CellValue::Integer(7));
        assert_eq!(cell_from_mysql(&Value::UInt(u64::MAX)), CellValue::Real(u64::MAX as f64));
        assert_eq!(cell_from_mysql(&Value::Bytes(b"Prime Sedan".to_vec())), CellValue::Text("Prime Sedan".to_string()));
        assert_eq!(cell_from_mysql(&Value::NULL), CellValue::Null);
        assert_eq!(cell_from_mysql(&Value::Double(4.5)), CellValue::Real(4.5));
    }

    #[test]
    fn time_values_are_formatted() {
        assert_eq!(
            cell_from_mysql(&Value::Time(false, 1, 2, 3, 4, 5)),
            CellValue::Text("26:03:04.000005".to_string())
        );
        assert_eq!(
            cell_from_mysql(&Value::Time(true, 0, 0, 30, 0, 0)),
            CellValue::Text("-00:30:00.000000".to_string())
        );
    }
}
