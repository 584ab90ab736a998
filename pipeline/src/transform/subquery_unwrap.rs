use std::sync::Arc;

use common::config::ProxyConfig;
use sqlparser::ast::{
    BinaryOperator, Expr, Query, SelectItem, SetExpr, Statement, TableFactor, Value,
};

use crate::analyzer::SqlAst;
use crate::error::PipelineError;

/// Flattens the wrapper BI clients put around custom SQL:
/// `SELECT * FROM (inner) alias`, or the variant that re-selects the
/// inner columns through the alias. The inner SELECT survives; the
/// wrapper's WHERE / ORDER BY / LIMIT are merged into it.
#[derive(Debug)]
pub struct SubqueryUnwrapper {
    config: Arc<ProxyConfig>,
}

impl SubqueryUnwrapper {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        SubqueryUnwrapper { config }
    }

    /// `Ok(None)` when the statement does not match the wrapper pattern.
    pub fn unwrap(&self, ast: &SqlAst) -> Result<Option<SqlAst>, PipelineError> {
        if !self.config.transformations.unwrap_subqueries {
            return Ok(None);
        }

        let outer_query = match ast.query() {
            Some(q) => q,
            None => return Ok(None),
        };
        let outer = match outer_query.body.as_ref() {
            SetExpr::Select(s) => s,
            _ => return Ok(None),
        };

        // Exactly one derived table, no joins beside it.
        let (inner_query, alias) = match outer.from.as_slice() {
            [twj] if twj.joins.is_empty() => match &twj.relation {
                TableFactor::Derived {
                    subquery, alias, ..
                } => (
                    subquery,
                    alias.as_ref().map(|a| a.name.value.clone()),
                ),
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        if !projection_matches(&outer.projection, alias.as_deref()) {
            return Ok(None);
        }

        // Only a plain inner SELECT can absorb the outer clauses.
        if inner_query.with.is_some() {
            return Ok(None);
        }
        let mut unwrapped: Query = (**inner_query).clone();
        let inner_select = match unwrapped.body.as_mut() {
            SetExpr::Select(s) => s,
            _ => return Ok(None),
        };

        // Outer WHERE becomes the right conjunct of the inner WHERE.
        if let Some(outer_where) = outer.selection.clone() {
            inner_select.selection = Some(match inner_select.selection.take() {
                Some(inner_where) => Expr::BinaryOp {
                    left: Box::new(inner_where),
                    op: BinaryOperator::And,
                    right: Box::new(outer_where),
                },
                None => outer_where,
            });
        }

        if unwrapped.order_by.is_empty() && !outer_query.order_by.is_empty() {
            unwrapped.order_by = outer_query.order_by.clone();
        }

        unwrapped.limit = merge_limits(outer_query.limit.as_ref(), unwrapped.limit.take());

        let result = SqlAst(Statement::Query(Box::new(unwrapped)));

        let depth = result.subquery_depth();
        let max = self.config.transformations.max_subquery_depth;
        if depth > max {
            return Err(PipelineError::SubqueryTooComplex { depth, max });
        }

        Ok(Some(result))
    }
}

/// `SELECT *`, or every projected item a column that is unqualified or
/// qualified by the wrapper alias.
fn projection_matches(projection: &[SelectItem], alias: Option<&str>) -> bool {
    if projection.is_empty() {
        return false;
    }
    if projection.len() == 1 {
        if let SelectItem::Wildcard(_) = projection[0] {
            return true;
        }
    }

    projection.iter().all(|item| {
        let expr = match item {
            SelectItem::UnnamedExpr(e) => e,
            _ => return false,
        };
        match expr {
            Expr::Identifier(_) => true,
            Expr::CompoundIdentifier(parts) if parts.len() == 2 => match alias {
                Some(alias) => parts[0].value.eq_ignore_ascii_case(alias),
                None => false,
            },
            _ => false,
        }
    })
}

/// Min of both when both are numeric literals; the outer one when the
/// inner is absent; otherwise the inner stays.
fn merge_limits(outer: Option<&Expr>, inner: Option<Expr>) -> Option<Expr> {
    let outer = match outer {
        Some(e) => e,
        None => return inner,
    };

    match inner {
        None => Some(outer.clone()),
        Some(inner_expr) => {
            match (limit_value(outer), limit_value(&inner_expr)) {
                (Some(o), Some(i)) => {
                    let min = o.min(i);
                    Some(Expr::Value(Value::Number(min.to_string(), false)))
                }
                _ => Some(inner_expr),
            }
        }
    }
}

fn limit_value(e: &Expr) -> Option<u64> {
    match e {
        Expr::Value(Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}
