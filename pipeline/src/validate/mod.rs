use std::sync::Arc;

use common::config::ProxyConfig;

use crate::analyzer::SqlAst;
use crate::error::PipelineError;

/// Business rule: every SELECT must pin the data snapshot by filtering on
/// one of the configured date columns. Runs after the transforms so an
/// unwrapped inner WHERE counts.
#[derive(Debug)]
pub struct TemporalValidator {
    config: Arc<ProxyConfig>,
}

impl TemporalValidator {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        TemporalValidator { config }
    }

    pub fn validate(&self, ast: &SqlAst) -> Result<(), PipelineError> {
        if !self.config.business_rules.require_date_filter {
            return Ok(());
        }

        // Non-SELECT statements are exempt.
        if !ast.is_select() {
            return Ok(());
        }

        let satisfied = self
            .config
            .business_rules
            .date_columns
            .iter()
            .any(|col| ast.column_in_where(col));

        if satisfied {
            Ok(())
        } else {
            Err(PipelineError::MissingDateFilter)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer::SqlAnalyzer;

    fn validator() -> TemporalValidator {
        TemporalValidator::new(Arc::new(ProxyConfig::default()))
    }

    fn ast(sql: &str) -> SqlAst {
        SqlAnalyzer::new().parse(sql).unwrap()
    }

    #[test]
    fn test_missing_filter_rejected() {
        let err = validator()
            .validate(&ast("SELECT category, SUM(amount) FROM sales GROUP BY category"))
            .unwrap_err();
        assert_eq!(err, PipelineError::MissingDateFilter);
    }

    #[test]
    fn test_cob_date_accepted() {
        assert!(validator()
            .validate(&ast("SELECT id FROM sales WHERE cob_date = '2024-01-15'"))
            .is_ok());
    }

    #[test]
    fn test_date_index_accepted() {
        assert!(validator()
            .validate(&ast("SELECT id FROM sales WHERE DATE_INDEX >= 20240115"))
            .is_ok());
    }

    #[test]
    fn test_qualified_date_column_accepted() {
        assert!(validator()
            .validate(&ast("SELECT id FROM sales s WHERE s.cob_date = '2024-01-15'"))
            .is_ok());
    }

    #[test]
    fn test_no_where_rejected() {
        let err = validator()
            .validate(&ast("SELECT id FROM sales"))
            .unwrap_err();
        assert_eq!(err, PipelineError::MissingDateFilter);
    }

    #[test]
    fn test_disabled() {
        let mut config = ProxyConfig::default();
        config.business_rules.require_date_filter = false;
        let validator = TemporalValidator::new(Arc::new(config));

        assert!(validator.validate(&ast("SELECT id FROM sales")).is_ok());
    }
}
