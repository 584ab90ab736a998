use thiserror::Error;

use crate::normalize::CellValue;

/// Column description as the backend reports it: a name plus the backend
/// type name ("VARCHAR", "DECIMAL", ...). The wire tag is derived later
/// from the fixed mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendColumn {
    pub name: String,
    pub type_name: String,
}

impl BackendColumn {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, type_name: T) -> Self {
        BackendColumn {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Successful backend execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub columns: Vec<BackendColumn>,
    pub rows: Vec<Vec<CellValue>>,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The configured wall-clock deadline expired.
    Timeout,
    /// No pooled connection became available within the acquire bound.
    PoolExhausted,
    /// The driver or server reported an error.
    Driver,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub code: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn driver<S: Into<String>>(code: Option<u16>, message: S) -> Self {
        BackendError {
            kind: BackendErrorKind::Driver,
            code,
            message: message.into(),
        }
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        BackendError {
            kind: BackendErrorKind::Timeout,
            code: None,
            message: message.into(),
        }
    }

    pub fn pool_exhausted<S: Into<String>>(message: S) -> Self {
        BackendError {
            kind: BackendErrorKind::PoolExhausted,
            code: None,
            message: message.into(),
        }
    }
}

/// The pipeline's only view of the backend. Implementations own pooling,
/// liveness checks and reconnection; each `execute` either runs on a
/// healthy connection or reports one error. Autocommit is always on.
pub trait BackendExecutor: Send + Sync {
    fn execute(&self, sql: &str) -> Result<ExecOutput, BackendError>;
}

#[cfg(any(test, feature = "mock_api"))]
pub use mock::MockExecutor;

#[cfg(any(test, feature = "mock_api"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted stand-in for a real backend: records every statement it
    /// is asked to run and replays queued responses, falling back to a
    /// fixed default output.
    #[derive(Debug, Default)]
    pub struct MockExecutor {
        calls: Mutex<Vec<String>>,
        responses: Mutex<VecDeque<Result<ExecOutput, BackendError>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            MockExecutor::default()
        }

        pub fn push_output(&self, output: ExecOutput) {
            self.responses.lock().unwrap().push_back(Ok(output));
        }

        pub fn push_error(&self, error: BackendError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        /// Every statement seen so far, in execution order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn sample_output() -> ExecOutput {
            ExecOutput {
                columns: vec![
                    BackendColumn::new("id", "INT"),
                    BackendColumn::new("t", "DECIMAL"),
                ],
                rows: vec![
                    vec![CellValue::Int(1), CellValue::Text("10.5".to_string())],
                    vec![CellValue::Int(2), CellValue::Text("20.25".to_string())],
                ],
                elapsed_ms: 1.5,
            }
        }
    }

    impl BackendExecutor for MockExecutor {
        fn execute(&self, sql: &str) -> Result<ExecOutput, BackendError> {
            self.calls.lock().unwrap().push(sql.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(response) => response,
                None => Ok(ExecOutput::default()),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_records_calls_and_replays_responses() {
        let mock = MockExecutor::new();
        mock.push_output(MockExecutor::sample_output());
        mock.push_error(BackendError::timeout("deadline exceeded"));

        let ok = mock.execute("SELECT 1").unwrap();
        assert_eq!(ok.columns.len(), 2);

        let err = mock.execute("SELECT 2").unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Timeout);

        // queue drained: default empty output
        let dflt = mock.execute("SELECT 3").unwrap();
        assert!(dflt.columns.is_empty());

        assert_eq!(mock.calls(), vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }
}
