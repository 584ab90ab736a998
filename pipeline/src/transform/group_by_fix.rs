use std::sync::Arc;

use common::config::ProxyConfig;
use sqlparser::ast::{Expr, GroupByExpr, Select, SelectItem, SetExpr, Statement};

use crate::analyzer::sql_analyzer::{function_name, is_aggregate_name};
use crate::analyzer::{walk, SqlAst};

/// Completes GROUP BY clauses for aggregating SELECTs: every projected
/// column that is not aggregated must be grouped, or the backend
/// misinterprets the query.
#[derive(Debug)]
pub struct GroupByFixer {
    config: Arc<ProxyConfig>,
}

impl GroupByFixer {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        GroupByFixer { config }
    }

    /// `None` when nothing needed fixing; otherwise the fixed statement
    /// plus the labels of the columns that were added, in projection
    /// order.
    pub fn fix(&self, ast: &SqlAst) -> Option<(SqlAst, Vec<String>)> {
        if !self.config.transformations.auto_fix_group_by {
            return None;
        }

        let select = ast.top_select()?;
        if !ast.has_aggregates() {
            return None;
        }

        // Candidate grouping set: projection items that neither are nor
        // contain an aggregate; `*` never qualifies.
        let mut wanted: Vec<(String, Expr)> = Vec::new();
        for item in &select.projection {
            let expr = match item {
                SelectItem::UnnamedExpr(e) => e,
                SelectItem::ExprWithAlias { expr, .. } => expr,
                _ => continue,
            };
            if contains_aggregate(expr) {
                continue;
            }
            wanted.push((grouping_label(expr), expr.clone()));
        }

        if wanted.is_empty() {
            return None;
        }

        let existing: Vec<String> = match &select.group_by {
            GroupByExpr::Expressions(exprs) => exprs
                .iter()
                .map(|e| grouping_label(e).to_ascii_lowercase())
                .collect(),
            // GROUP BY ALL already covers every projected column.
            GroupByExpr::All => return None,
        };

        let missing: Vec<(String, Expr)> = wanted
            .into_iter()
            .filter(|(label, _)| !existing.contains(&label.to_ascii_lowercase()))
            .collect();

        if missing.is_empty() {
            return None;
        }

        let mut stmt = ast.clone().into_statement();
        let select = top_select_mut(&mut stmt)?;
        let added: Vec<String> = missing.iter().map(|(label, _)| label.clone()).collect();

        match &mut select.group_by {
            GroupByExpr::Expressions(exprs) => {
                exprs.extend(missing.into_iter().map(|(_, e)| e));
            }
            GroupByExpr::All => return None,
        }

        Some((SqlAst(stmt), added))
    }
}

fn top_select_mut(stmt: &mut Statement) -> Option<&mut Select> {
    match stmt {
        Statement::Query(q) => match q.body.as_mut() {
            SetExpr::Select(s) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn contains_aggregate(expr: &Expr) -> bool {
    let mut found = false;
    walk::expr_walk(expr, &mut |e| {
        if let Expr::Function(func) = e {
            if is_aggregate_name(&function_name(func)) {
                found = true;
            }
        }
    });
    found
}

/// Column name for plain (possibly qualified) columns, emitted SQL for
/// complex expressions, so that equivalents compare equal.
fn grouping_label(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}
