use std::io;
use std::time::{Duration, Instant};

use mysql::consts::ColumnType;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Value};
use tracing::debug;

use common::config::BackendConfig;
use pipeline::{BackendColumn, BackendError, BackendExecutor, CellValue, ExecOutput};

use super::pool::{ConnectionPool, PoolOptions};

/// Backend executor over the native MySQL driver. One pool shared by all
/// sessions; autocommit stays on; the driver's socket timeouts act as the
/// per-statement wall-clock deadline.
pub struct NativeExecutor {
    pool: ConnectionPool,
}

impl NativeExecutor {
    pub fn from_config(config: &BackendConfig) -> Self {
        let execute_timeout = Duration::from_secs(config.execute_timeout_seconds);

        let mut builder = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.username.clone()))
            .pass(Some(config.password.clone()))
            .tcp_connect_timeout(Some(Duration::from_secs(10)))
            .read_timeout(Some(execute_timeout))
            .write_timeout(Some(execute_timeout))
            .init(vec!["SET autocommit=1".to_string()]);
        if !config.database.is_empty() {
            builder = builder.db_name(Some(config.database.clone()));
        }

        let options = PoolOptions {
            size: config.pool_size,
            recycle: Duration::from_secs(config.pool_recycle_seconds),
            pre_ping: config.pool_pre_ping,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_seconds),
        };

        NativeExecutor {
            pool: ConnectionPool::new(Opts::from(builder), options),
        }
    }
}

impl BackendExecutor for NativeExecutor {
    fn execute(&self, sql: &str) -> Result<ExecOutput, BackendError> {
        let started = Instant::now();
        debug!(sql, "backend execute");

        let mut pooled = self.pool.acquire()?;

        match run_query(&mut pooled.conn, sql) {
            Ok((columns, rows)) => {
                self.pool.release(pooled, true);
                Ok(ExecOutput {
                    columns,
                    rows,
                    elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
                })
            }
            Err(e) => {
                // a failed connection never goes back into the pool
                self.pool.release(pooled, false);
                Err(classify_error(e))
            }
        }
    }
}

fn run_query(
    conn: &mut Conn,
    sql: &str,
) -> Result<(Vec<BackendColumn>, Vec<Vec<CellValue>>), mysql::Error> {
    let mut result = conn.query_iter(sql)?;

    let columns: Vec<BackendColumn> = result
        .columns()
        .as_ref()
        .iter()
        .map(|c| BackendColumn::new(c.name_str().into_owned(), type_name(c.column_type())))
        .collect();

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for row in result.by_ref() {
        let row = row?;
        let values = row.unwrap();
        rows.push(
            values
                .into_iter()
                .enumerate()
                .map(|(idx, v)| {
                    let tn = columns
                        .get(idx)
                        .map(|c| c.type_name.as_str())
                        .unwrap_or("VARCHAR");
                    decode_value(v, tn)
                })
                .collect(),
        );
    }

    Ok((columns, rows))
}

/// Driver value → cell, with temporal values rendered the way the wire
/// protocol expects them.
fn decode_value(value: Value, type_name: &str) -> CellValue {
    match value {
        Value::NULL => CellValue::Null,
        Value::Bytes(bytes) => CellValue::from_bytes(&bytes),
        Value::Int(i) => CellValue::Int(i),
        Value::UInt(u) => CellValue::UInt(u),
        Value::Float(f) => CellValue::Double(f as f64),
        Value::Double(d) => CellValue::Double(d),
        Value::Date(year, month, day, hour, minute, second, _micros) => {
            if type_name == "DATE" {
                CellValue::Text(format!("{year:04}-{month:02}-{day:02}"))
            } else {
                CellValue::Text(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                ))
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, _micros) => {
            let total_hours = u32::from(hours) + days * 24;
            let sign = if negative { "-" } else { "" };
            CellValue::Text(format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}

/// Backend column type → the type names the normalizer's mapping table
/// understands.
fn type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => "DECIMAL",
        ColumnType::MYSQL_TYPE_TINY => "TINYINT",
        ColumnType::MYSQL_TYPE_SHORT => "SMALLINT",
        ColumnType::MYSQL_TYPE_LONG => "INT",
        ColumnType::MYSQL_TYPE_FLOAT => "FLOAT",
        ColumnType::MYSQL_TYPE_DOUBLE => "DOUBLE",
        ColumnType::MYSQL_TYPE_NULL => "NULL",
        ColumnType::MYSQL_TYPE_TIMESTAMP => "TIMESTAMP",
        ColumnType::MYSQL_TYPE_LONGLONG => "BIGINT",
        ColumnType::MYSQL_TYPE_INT24 => "MEDIUMINT",
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => "DATE",
        ColumnType::MYSQL_TYPE_TIME => "TIME",
        ColumnType::MYSQL_TYPE_DATETIME => "DATETIME",
        ColumnType::MYSQL_TYPE_YEAR => "YEAR",
        ColumnType::MYSQL_TYPE_VARCHAR | ColumnType::MYSQL_TYPE_VAR_STRING => "VARCHAR",
        ColumnType::MYSQL_TYPE_STRING => "CHAR",
        ColumnType::MYSQL_TYPE_BIT => "BIT",
        ColumnType::MYSQL_TYPE_JSON => "JSON",
        ColumnType::MYSQL_TYPE_ENUM => "ENUM",
        ColumnType::MYSQL_TYPE_SET => "SET",
        ColumnType::MYSQL_TYPE_TINY_BLOB => "TINYBLOB",
        ColumnType::MYSQL_TYPE_MEDIUM_BLOB => "MEDIUMBLOB",
        ColumnType::MYSQL_TYPE_LONG_BLOB => "LONGBLOB",
        ColumnType::MYSQL_TYPE_BLOB => "BLOB",
        _ => "VARCHAR",
    }
}

/// Map driver failures onto the backend error taxonomy. Socket timeouts
/// are the statement deadline expiring.
pub(crate) fn classify_error(error: mysql::Error) -> BackendError {
    match error {
        mysql::Error::MySqlError(server) => BackendError::driver(Some(server.code), server.message),
        mysql::Error::IoError(ref io_err)
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) =>
        {
            BackendError::timeout(error.to_string())
        }
        other => BackendError::driver(None, other.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pipeline::BackendErrorKind;

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(ColumnType::MYSQL_TYPE_NEWDECIMAL), "DECIMAL");
        assert_eq!(type_name(ColumnType::MYSQL_TYPE_LONGLONG), "BIGINT");
        assert_eq!(type_name(ColumnType::MYSQL_TYPE_VAR_STRING), "VARCHAR");
        assert_eq!(type_name(ColumnType::MYSQL_TYPE_GEOMETRY), "VARCHAR");
    }

    #[test]
    fn test_decode_temporal_values() {
        let dt = decode_value(Value::Date(2024, 1, 15, 10, 30, 0, 0), "DATETIME");
        assert_eq!(dt, CellValue::Text("2024-01-15 10:30:00".to_string()));

        let d = decode_value(Value::Date(2024, 1, 15, 0, 0, 0, 0), "DATE");
        assert_eq!(d, CellValue::Text("2024-01-15".to_string()));

        let t = decode_value(Value::Time(false, 0, 10, 30, 0, 0), "TIME");
        assert_eq!(t, CellValue::Text("10:30:00".to_string()));

        let neg = decode_value(Value::Time(true, 1, 2, 0, 5, 0), "TIME");
        assert_eq!(neg, CellValue::Text("-26:00:05".to_string()));
    }

    #[test]
    fn test_decode_bytes_lossy() {
        let v = decode_value(Value::Bytes(vec![0x61, 0xff]), "VARCHAR");
        assert_eq!(v, CellValue::Text("a\u{FFFD}".to_string()));
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify_error(mysql::Error::MySqlError(mysql::error::MySqlError {
            state: "42S02".to_string(),
            message: "Table 'appdb.missing' doesn't exist".to_string(),
            code: 1146,
        }));
        assert_eq!(err.kind, BackendErrorKind::Driver);
        assert_eq!(err.code, Some(1146));
    }

    #[test]
    fn test_classify_timeout() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "read timed out");
        let err = classify_error(mysql::Error::IoError(io_err));
        assert_eq!(err.kind, BackendErrorKind::Timeout);
    }
}
