pub(crate) mod sql_analyzer;
pub(crate) mod walk;

pub use sql_analyzer::{QueryKind, SqlAnalyzer, SqlAst};
