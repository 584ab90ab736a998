pub mod group_by_fix;
pub mod info_schema;
pub mod paren_unwrap;
pub mod subquery_unwrap;

use std::sync::Arc;

use common::config::ProxyConfig;

use crate::analyzer::SqlAst;
use crate::error::PipelineError;

use group_by_fix::GroupByFixer;
use subquery_unwrap::SubqueryUnwrapper;

/// What a transformation did to the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationKind {
    ParenUnwrap,
    SubqueryUnwrap,
    InfoSchemaRewrite,
    GroupByFix,
}

impl TransformationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationKind::ParenUnwrap => "PAREN_UNWRAP",
            TransformationKind::SubqueryUnwrap => "SUBQUERY_UNWRAP",
            TransformationKind::InfoSchemaRewrite => "INFO_SCHEMA_REWRITE",
            TransformationKind::GroupByFix => "GROUP_BY_FIX",
        }
    }
}

/// One entry of the ordered transformation log carried in every result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationRecord {
    pub sequence: usize,
    pub kind: TransformationKind,
    pub before_sql: String,
    pub after_sql: String,
    /// e.g. the columns a GROUP_BY_FIX added
    pub details: Option<String>,
}

/// Output of the AST rewrite stages (T3 then T4).
#[derive(Debug)]
pub struct TransformOutcome {
    pub final_sql: String,
    pub final_ast: SqlAst,
    pub records: Vec<TransformationRecord>,
}

/// Ordered rewrite coordinator. Each stage's output is the next stage's
/// input; the order never changes.
#[derive(Debug)]
pub struct Transformer {
    subquery_unwrapper: SubqueryUnwrapper,
    group_by_fixer: GroupByFixer,
}

impl Transformer {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        Transformer {
            subquery_unwrapper: SubqueryUnwrapper::new(config.clone()),
            group_by_fixer: GroupByFixer::new(config),
        }
    }

    /// Apply T3 and T4 to a parsed statement. `next_sequence` continues
    /// the numbering started by the textual paren unwrap, which runs
    /// before parsing.
    pub fn transform(
        &self,
        sql: &str,
        ast: SqlAst,
        mut next_sequence: usize,
    ) -> Result<TransformOutcome, PipelineError> {
        let mut records = Vec::new();
        let mut current_sql = sql.to_string();
        let mut current_ast = ast;

        if let Some(unwrapped) = self.subquery_unwrapper.unwrap(&current_ast)? {
            let after = unwrapped.emit();
            records.push(TransformationRecord {
                sequence: next_sequence,
                kind: TransformationKind::SubqueryUnwrap,
                before_sql: current_sql.clone(),
                after_sql: after.clone(),
                details: None,
            });
            next_sequence += 1;
            current_sql = after;
            current_ast = unwrapped;
        }

        if let Some((fixed, added)) = self.group_by_fixer.fix(&current_ast) {
            let after = fixed.emit();
            records.push(TransformationRecord {
                sequence: next_sequence,
                kind: TransformationKind::GroupByFix,
                before_sql: current_sql.clone(),
                after_sql: after.clone(),
                details: Some(format!("columns added: {}", added.join(", "))),
            });
            current_sql = after;
            current_ast = fixed;
        }

        Ok(TransformOutcome {
            final_sql: current_sql,
            final_ast: current_ast,
            records,
        })
    }
}
