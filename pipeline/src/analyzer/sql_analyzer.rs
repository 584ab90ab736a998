use std::collections::HashSet;

use sqlparser::ast::{Expr, Query, Select, SelectItem, SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::error::PipelineError;

use super::walk;

/// Aggregate functions the GROUP BY fixer and the analyzer recognize.
pub(crate) const AGGREGATE_FUNCTIONS: [&str; 5] = ["SUM", "AVG", "MIN", "MAX", "COUNT"];

/// Statement class, decided from the first keyword without a full parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Show,
    Describe,
    Use,
    Set,
    Unknown,
}

impl QueryKind {
    pub fn of(sql: &str) -> QueryKind {
        let first = match sql.split_whitespace().next() {
            Some(word) => word.to_ascii_uppercase(),
            None => return QueryKind::Unknown,
        };

        match first.as_str() {
            "SELECT" => QueryKind::Select,
            "INSERT" => QueryKind::Insert,
            "UPDATE" => QueryKind::Update,
            "DELETE" => QueryKind::Delete,
            "CREATE" => QueryKind::Create,
            "DROP" => QueryKind::Drop,
            "ALTER" => QueryKind::Alter,
            "TRUNCATE" => QueryKind::Truncate,
            "SHOW" => QueryKind::Show,
            "DESCRIBE" => QueryKind::Describe,
            "USE" => QueryKind::Use,
            "SET" => QueryKind::Set,
            _ => QueryKind::Unknown,
        }
    }
}

/// Parsed statement, opaque outside the analyzer/transformer. Downstream
/// components ask questions instead of matching node types.
#[derive(Debug, Clone)]
pub struct SqlAst(pub(crate) Statement);

/// Dialect-aware parser front end.
#[derive(Debug, Default)]
pub struct SqlAnalyzer;

impl SqlAnalyzer {
    pub fn new() -> Self {
        SqlAnalyzer
    }

    /// Parse exactly one statement. Multi-statement batches are rejected.
    pub fn parse(&self, sql: &str) -> Result<SqlAst, PipelineError> {
        let mut statements =
            Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| PipelineError::Parse {
                detail: e.to_string(),
            })?;

        match statements.len() {
            0 => Err(PipelineError::Parse {
                detail: "empty statement".to_string(),
            }),
            1 => Ok(SqlAst(statements.remove(0))),
            n => Err(PipelineError::Parse {
                detail: format!("multi-statement input is not supported ({n} statements)"),
            }),
        }
    }

    pub fn query_kind(&self, sql: &str) -> QueryKind {
        QueryKind::of(sql)
    }

    /// SHOW / DESCRIBE / USE / SET, decided without parsing.
    pub fn is_metadata(&self, sql: &str) -> bool {
        matches!(
            QueryKind::of(sql),
            QueryKind::Show | QueryKind::Describe | QueryKind::Use | QueryKind::Set
        )
    }
}

impl SqlAst {
    pub(crate) fn statement(&self) -> &Statement {
        &self.0
    }

    pub(crate) fn into_statement(self) -> Statement {
        self.0
    }

    pub(crate) fn query(&self) -> Option<&Query> {
        match &self.0 {
            Statement::Query(q) => Some(q),
            _ => None,
        }
    }

    pub(crate) fn top_select(&self) -> Option<&Select> {
        match self.query()?.body.as_ref() {
            SetExpr::Select(select) => Some(select),
            _ => None,
        }
    }

    pub fn is_select(&self) -> bool {
        self.top_select().is_some()
    }

    /// Labels of every JOIN in the statement, e.g. "INNER JOIN".
    pub fn joins(&self) -> Vec<String> {
        let mut kinds = Vec::new();
        walk::for_each_join(&self.0, &mut |join| {
            kinds.push(join_label(&join.join_operator).to_string());
        });
        kinds
    }

    pub fn unions(&self) -> usize {
        walk::count_unions(&self.0)
    }

    /// Names of functions carrying an OVER clause.
    pub fn window_functions(&self) -> Vec<String> {
        let mut names = Vec::new();
        walk::for_each_expr(&self.0, &mut |e| {
            if let Expr::Function(func) = e {
                if func.over.is_some() {
                    names.push(function_name(func));
                }
            }
        });
        names
    }

    /// Which of `names` (case-insensitive) appear as function calls.
    pub fn functions(&self, names: &[String]) -> Vec<String> {
        let wanted: HashSet<String> = names.iter().map(|n| n.to_ascii_uppercase()).collect();
        let mut found = Vec::new();
        walk::for_each_expr(&self.0, &mut |e| {
            if let Expr::Function(func) = e {
                let name = function_name(func);
                if wanted.contains(&name) && !found.contains(&name) {
                    found.push(name);
                }
            }
        });
        found
    }

    /// Depth of the deepest nested subquery; 0 when flat.
    pub fn subquery_depth(&self) -> usize {
        walk::subquery_depth(&self.0)
    }

    /// Projection labels of the top-level SELECT: alias, column name, or
    /// the emitted SQL of a complex expression.
    pub fn select_columns(&self) -> Vec<String> {
        let select = match self.top_select() {
            Some(s) => s,
            None => return vec![],
        };

        select.projection.iter().map(projection_label).collect()
    }

    /// Lowercased names of columns referenced inside aggregate calls.
    pub fn aggregated_columns(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        walk::for_each_expr(&self.0, &mut |e| {
            if let Expr::Function(func) = e {
                if is_aggregate_name(&function_name(func)) {
                    for arg in &func.args {
                        use sqlparser::ast::{FunctionArg, FunctionArgExpr};
                        if let FunctionArg::Unnamed(FunctionArgExpr::Expr(inner))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(inner),
                            ..
                        } = arg
                        {
                            collect_column_names(inner, &mut out);
                        }
                    }
                }
            }
        });
        out
    }

    /// Any SUM/AVG/MIN/MAX/COUNT call anywhere in the statement.
    pub fn has_aggregates(&self) -> bool {
        let mut found = false;
        walk::for_each_expr(&self.0, &mut |e| {
            if let Expr::Function(func) = e {
                if func.over.is_none() && is_aggregate_name(&function_name(func)) {
                    found = true;
                }
            }
        });
        found
    }

    /// Case-insensitive column reference anywhere in the top-level WHERE
    /// subtree, regardless of operator.
    pub fn column_in_where(&self, column: &str) -> bool {
        let select = match self.top_select() {
            Some(s) => s,
            None => return false,
        };
        let selection = match &select.selection {
            Some(e) => e,
            None => return false,
        };

        let mut found = false;
        walk::expr_walk(selection, &mut |e| match e {
            Expr::Identifier(ident) if ident.value.eq_ignore_ascii_case(column) => found = true,
            Expr::CompoundIdentifier(parts) => {
                if let Some(last) = parts.last() {
                    if last.value.eq_ignore_ascii_case(column) {
                        found = true;
                    }
                }
            }
            _ => {}
        });
        found
    }

    /// Deterministic, non-pretty SQL. A parenthesized top-level SELECT is
    /// stripped because the backend rejects it.
    pub fn emit(&self) -> String {
        if let Statement::Query(q) = &self.0 {
            let mut body = q.body.as_ref();
            if q.with.is_none()
                && q.order_by.is_empty()
                && q.limit.is_none()
                && q.offset.is_none()
                && q.fetch.is_none()
            {
                while let SetExpr::Query(inner) = body {
                    if inner.with.is_none()
                        && inner.order_by.is_empty()
                        && inner.limit.is_none()
                        && inner.offset.is_none()
                        && inner.fetch.is_none()
                    {
                        body = inner.body.as_ref();
                    } else {
                        return inner.to_string();
                    }
                }
                if !std::ptr::eq(body, q.body.as_ref()) {
                    return body.to_string();
                }
            }
        }
        self.0.to_string()
    }
}

pub(crate) fn is_aggregate_name(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.iter().any(|a| *a == name)
}

pub(crate) fn function_name(func: &sqlparser::ast::Function) -> String {
    match func.name.0.last() {
        Some(ident) => ident.value.to_ascii_uppercase(),
        None => String::new(),
    }
}

/// The expression under a projection item, if any.
pub(crate) fn projection_expr(item: &SelectItem) -> Option<&Expr> {
    match item {
        SelectItem::UnnamedExpr(e) => Some(e),
        SelectItem::ExprWithAlias { expr, .. } => Some(expr),
        SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => None,
    }
}

/// Label for one projection item: the alias when present, the bare column
/// name for plain columns, the emitted SQL otherwise.
pub(crate) fn projection_label(item: &SelectItem) -> String {
    match item {
        SelectItem::ExprWithAlias { alias, .. } => alias.value.clone(),
        SelectItem::UnnamedExpr(Expr::Identifier(ident)) => ident.value.clone(),
        SelectItem::UnnamedExpr(Expr::CompoundIdentifier(parts)) => parts
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default(),
        SelectItem::UnnamedExpr(e) => e.to_string(),
        SelectItem::Wildcard(_) => "*".to_string(),
        SelectItem::QualifiedWildcard(name, _) => format!("{name}.*"),
    }
}

fn collect_column_names(expr: &Expr, out: &mut HashSet<String>) {
    walk::expr_walk(expr, &mut |e| match e {
        Expr::Identifier(ident) => {
            out.insert(ident.value.to_ascii_lowercase());
        }
        Expr::CompoundIdentifier(parts) => {
            if let Some(last) = parts.last() {
                out.insert(last.value.to_ascii_lowercase());
            }
        }
        _ => {}
    });
}

fn join_label(op: &sqlparser::ast::JoinOperator) -> &'static str {
    use sqlparser::ast::JoinOperator;

    match op {
        JoinOperator::Inner(_) => "INNER JOIN",
        JoinOperator::LeftOuter(_) => "LEFT JOIN",
        JoinOperator::RightOuter(_) => "RIGHT JOIN",
        JoinOperator::FullOuter(_) => "FULL OUTER JOIN",
        JoinOperator::CrossJoin => "CROSS JOIN",
        JoinOperator::LeftSemi(_) => "LEFT SEMI JOIN",
        JoinOperator::RightSemi(_) => "RIGHT SEMI JOIN",
        JoinOperator::LeftAnti(_) => "LEFT ANTI JOIN",
        JoinOperator::RightAnti(_) => "RIGHT ANTI JOIN",
        _ => "JOIN",
    }
}
