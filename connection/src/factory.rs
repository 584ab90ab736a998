use std::sync::Arc;

use common::config::ProxyConfig;
use common::err::{PResult, ProxyError};
use pipeline::BackendExecutor;

use crate::native::NativeExecutor;

/// Build the backend executor the configuration asks for. Only the native
/// driver is compiled in; "odbc" is recognized so existing config files
/// fail with a clear message instead of an unknown-key error.
pub fn create_executor(config: &ProxyConfig) -> PResult<Arc<dyn BackendExecutor>> {
    match config.backend.connection_type.to_ascii_lowercase().as_str() {
        "native" => Ok(Arc::new(NativeExecutor::from_config(&config.backend))),
        "odbc" => Err(ProxyError::config(
            "connection_type 'odbc' is not available in this build; use 'native'",
        )),
        other => Err(ProxyError::config(format!(
            "invalid connection_type: {other}. Must be 'native'"
        ))),
    }
}
