use std::sync::Arc;

use common::config::ProxyConfig;

use crate::analyzer::SqlAst;
use crate::error::PipelineError;

/// Rejects constructs the backend cannot execute. Checks run in a fixed
/// order (joins, unions, window functions, functions) and the first match
/// wins.
#[derive(Debug)]
pub struct CapabilityDetector {
    config: Arc<ProxyConfig>,
}

impl CapabilityDetector {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        CapabilityDetector { config }
    }

    pub fn check(&self, ast: &SqlAst) -> Result<(), PipelineError> {
        if self.config.is_unsupported_feature("joins") {
            let kinds = ast.joins();
            if !kinds.is_empty() {
                return Err(PipelineError::UnsupportedJoin { kinds });
            }
        }

        if self.config.is_unsupported_feature("unions") {
            let count = ast.unions();
            if count > 0 {
                return Err(PipelineError::UnsupportedUnion { count });
            }
        }

        if self.config.is_unsupported_feature("window_functions") {
            let names = ast.window_functions();
            if !names.is_empty() {
                return Err(PipelineError::UnsupportedWindow { names });
            }
        }

        let unsupported = &self.config.capabilities.unsupported_functions;
        if !unsupported.is_empty() {
            let names = ast.functions(unsupported);
            if !names.is_empty() {
                return Err(PipelineError::UnsupportedFunction { names });
            }
        }

        Ok(())
    }
}
