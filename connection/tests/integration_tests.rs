use std::fs;
use std::path::Path;

use serde::Deserialize;

use common::config::ProxyConfig;
use connection::create_executor;
use pipeline::{BackendExecutor, CellValue};

/// Integration tests - they need a reachable MySQL server.
///
/// To run them:
/// 1. copy connection/tests/test-config.toml.example to
///    connection/tests/test-config.toml
/// 2. point it at your server
/// 3. cargo test --package connection --test integration_tests
///
/// Without the config file every test is skipped silently.
#[derive(Debug, Deserialize)]
struct TestConfig {
    mysql: MysqlConfig,
}

#[derive(Debug, Deserialize)]
struct MysqlConfig {
    host: String,
    port: u16,
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    database: String,
}

fn load_test_config() -> Option<TestConfig> {
    let path = Path::new("tests/test-config.toml");
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn executor_from(test_config: &TestConfig) -> std::sync::Arc<dyn BackendExecutor> {
    let mut config = ProxyConfig::default();
    config.backend.host = test_config.mysql.host.clone();
    config.backend.port = test_config.mysql.port;
    config.backend.username = test_config.mysql.username.clone();
    config.backend.password = test_config.mysql.password.clone();
    config.backend.database = test_config.mysql.database.clone();
    create_executor(&config).expect("executor construction failed")
}

#[test]
fn test_select_literal() {
    let test_config = match load_test_config() {
        Some(c) => c,
        None => return,
    };
    let executor = executor_from(&test_config);

    let output = executor.execute("SELECT 1 + 1").expect("query failed");
    assert_eq!(output.rows.len(), 1);
    match &output.rows[0][0] {
        CellValue::Int(v) => assert_eq!(*v, 2),
        CellValue::Text(s) => assert_eq!(s, "2"),
        other => panic!("unexpected cell: {other:?}"),
    }
}

#[test]
fn test_show_tables_runs() {
    let test_config = match load_test_config() {
        Some(c) => c,
        None => return,
    };
    let executor = executor_from(&test_config);

    let output = executor.execute("SHOW TABLES").expect("query failed");
    assert_eq!(output.columns.len(), 1);
}

#[test]
fn test_server_error_is_reported() {
    let test_config = match load_test_config() {
        Some(c) => c,
        None => return,
    };
    let executor = executor_from(&test_config);

    let err = executor
        .execute("SELECT * FROM table_that_does_not_exist_xyz")
        .unwrap_err();
    assert!(err.code.is_some());
}
