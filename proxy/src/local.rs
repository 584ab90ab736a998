//! Client probes answered without touching the backend: connection
//! handshake chatter, introspection literals, and transaction no-ops
//! (the proxy is read-only and autocommits).

use pipeline::{BackendColumn, CellValue};

/// Version string reported to clients that ask.
pub const SERVER_VERSION: &str = "8.0.25";

/// A locally produced response.
#[derive(Debug, PartialEq)]
pub enum LocalAnswer {
    /// Plain OK packet, no result set.
    Ok,
    /// A small synthetic result set.
    Rows {
        columns: Vec<BackendColumn>,
        rows: Vec<Vec<CellValue>>,
    },
}

/// Answer a statement locally if it is one of the known probes.
pub fn answer(sql: &str, connection_id: u32, current_schema: Option<&str>) -> Option<LocalAnswer> {
    let normalized = normalize(sql);

    match normalized.as_str() {
        "commit" | "rollback" => Some(LocalAnswer::Ok),
        "select 1" => Some(single_cell("1", "BIGINT", CellValue::Int(1))),
        "select connection_id()" => Some(single_cell(
            "CONNECTION_ID()",
            "BIGINT",
            CellValue::Int(i64::from(connection_id)),
        )),
        "select database()" => Some(single_cell(
            "DATABASE()",
            "VARCHAR",
            match current_schema {
                Some(schema) => CellValue::Text(schema.to_string()),
                None => CellValue::Null,
            },
        )),
        "select current_user()" | "select user()" => Some(single_cell(
            "USER()",
            "VARCHAR",
            CellValue::Text("proxy@%".to_string()),
        )),
        "select version()" | "select @@version" => Some(single_cell(
            "VERSION()",
            "VARCHAR",
            CellValue::Text(SERVER_VERSION.to_string()),
        )),
        "select @@version_comment" | "select @@version_comment limit 1" => Some(single_cell(
            "@@version_comment",
            "VARCHAR",
            CellValue::Text("dategate proxy".to_string()),
        )),
        _ => None,
    }
}

fn single_cell(name: &str, type_name: &str, value: CellValue) -> LocalAnswer {
    LocalAnswer::Rows {
        columns: vec![BackendColumn::new(name, type_name)],
        rows: vec![vec![value]],
    }
}

fn normalize(sql: &str) -> String {
    sql.trim()
        .trim_end_matches(';')
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_select_one() {
        match answer("SELECT 1", 7, None) {
            Some(LocalAnswer::Rows { columns, rows }) => {
                assert_eq!(columns[0].name, "1");
                assert_eq!(rows[0][0], CellValue::Int(1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_connection_id() {
        match answer("select CONNECTION_ID();", 42, None) {
            Some(LocalAnswer::Rows { rows, .. }) => assert_eq!(rows[0][0], CellValue::Int(42)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_database_reflects_session_schema() {
        match answer("SELECT DATABASE()", 1, Some("appdb")) {
            Some(LocalAnswer::Rows { rows, .. }) => {
                assert_eq!(rows[0][0], CellValue::Text("appdb".to_string()))
            }
            other => panic!("unexpected: {other:?}"),
        }
        match answer("SELECT DATABASE()", 1, None) {
            Some(LocalAnswer::Rows { rows, .. }) => assert_eq!(rows[0][0], CellValue::Null),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_commit_rollback_are_noops() {
        assert_eq!(answer("COMMIT", 1, None), Some(LocalAnswer::Ok));
        assert_eq!(answer("rollback;", 1, None), Some(LocalAnswer::Ok));
    }

    #[test]
    fn test_real_queries_not_intercepted() {
        assert!(answer("SELECT id FROM t WHERE cob_date='2024-01-15'", 1, None).is_none());
        assert!(answer("SHOW TABLES", 1, None).is_none());
    }
}
