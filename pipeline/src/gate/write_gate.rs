use std::sync::Arc;

use common::config::ProxyConfig;

use crate::error::PipelineError;

/// Cheap outer gate: reject write statements by their first keyword,
/// before any parsing happens.
#[derive(Debug)]
pub struct WriteGate {
    config: Arc<ProxyConfig>,
}

impl WriteGate {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        WriteGate { config }
    }

    pub fn check(&self, sql: &str) -> Result<(), PipelineError> {
        if !self.config.security.block_writes {
            return Ok(());
        }

        let first = match sql.split_whitespace().next() {
            Some(word) => word.to_ascii_uppercase(),
            None => return Ok(()),
        };

        if self.config.is_write_operation(&first) {
            return Err(PipelineError::WriteBlocked { operation: first });
        }

        Ok(())
    }
}
