use thiserror::Error;

/// Every way a query can be rejected, as one sum type returned from the
/// pipeline. `Display` gives a short diagnostic for logs; the text sent to
/// the client comes from the error formatter, nowhere else.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("write operation blocked: {operation}")]
    WriteBlocked { operation: String },

    #[error("parse error: {detail}")]
    Parse { detail: String },

    #[error("unsupported joins: {kinds:?}")]
    UnsupportedJoin { kinds: Vec<String> },

    #[error("unsupported unions: {count}")]
    UnsupportedUnion { count: usize },

    #[error("unsupported window functions: {names:?}")]
    UnsupportedWindow { names: Vec<String> },

    #[error("unsupported functions: {names:?}")]
    UnsupportedFunction { names: Vec<String> },

    #[error("subquery too complex: depth {depth} > max {max}")]
    SubqueryTooComplex { depth: usize, max: usize },

    #[error("missing mandatory date filter")]
    MissingDateFilter,

    #[error("schema blocked: {schema}")]
    SchemaBlocked { schema: String },

    #[error("backend error{}: {message}", .code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Backend { code: Option<u16>, message: String },

    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl PipelineError {
    /// Stable lowercase tag used in rejection log events.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::WriteBlocked { .. } => "write_operation",
            PipelineError::Parse { .. } => "parse_error",
            PipelineError::UnsupportedJoin { .. } => "joins",
            PipelineError::UnsupportedUnion { .. } => "unions",
            PipelineError::UnsupportedWindow { .. } => "window_functions",
            PipelineError::UnsupportedFunction { .. } => "unsupported_function",
            PipelineError::SubqueryTooComplex { .. } => "complex_subquery",
            PipelineError::MissingDateFilter => "missing_date_filter",
            PipelineError::SchemaBlocked { .. } => "schema_blocked",
            PipelineError::Backend { .. } => "backend_error",
            PipelineError::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_is_short() {
        let e = PipelineError::SubqueryTooComplex { depth: 3, max: 2 };
        assert_eq!(e.to_string(), "subquery too complex: depth 3 > max 2");
    }

    #[test]
    fn test_backend_code_rendering() {
        let with = PipelineError::Backend {
            code: Some(1146),
            message: "table missing".to_string(),
        };
        let without = PipelineError::Backend {
            code: None,
            message: "gone".to_string(),
        };
        assert_eq!(with.to_string(), "backend error (1146): table missing");
        assert_eq!(without.to_string(), "backend error: gone");
    }
}
