//! Recursive traversal helpers over the sqlparser AST. Only the analyzer
//! and the transformers look at node types; everything else goes through
//! the `SqlAst` question API.

use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, Join, JoinOperator, Query, Select, SetExpr, Statement,
    TableFactor, WindowType,
};

/// Visit every expression reachable from the statement, including
/// expressions inside nested subqueries.
pub(crate) fn for_each_expr(stmt: &Statement, f: &mut impl FnMut(&Expr)) {
    if let Statement::Query(q) = stmt {
        query_exprs(q, f);
    }
}

pub(crate) fn query_exprs(q: &Query, f: &mut impl FnMut(&Expr)) {
    if let Some(with) = &q.with {
        for cte in &with.cte_tables {
            query_exprs(&cte.query, f);
        }
    }
    set_expr_exprs(&q.body, f);
    for ob in &q.order_by {
        expr_walk(&ob.expr, f);
    }
    if let Some(limit) = &q.limit {
        expr_walk(limit, f);
    }
    if let Some(offset) = &q.offset {
        expr_walk(&offset.value, f);
    }
}

fn set_expr_exprs(body: &SetExpr, f: &mut impl FnMut(&Expr)) {
    match body {
        SetExpr::Select(select) => select_exprs(select, f),
        SetExpr::Query(q) => query_exprs(q, f),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_exprs(left, f);
            set_expr_exprs(right, f);
        }
        _ => {}
    }
}

fn select_exprs(select: &Select, f: &mut impl FnMut(&Expr)) {
    for item in &select.projection {
        if let Some(e) = super::sql_analyzer::projection_expr(item) {
            expr_walk(e, f);
        }
    }
    for twj in &select.from {
        table_factor_exprs(&twj.relation, f);
        for join in &twj.joins {
            table_factor_exprs(&join.relation, f);
            join_constraint_exprs(&join.join_operator, f);
        }
    }
    if let Some(sel) = &select.selection {
        expr_walk(sel, f);
    }
    if let sqlparser::ast::GroupByExpr::Expressions(exprs) = &select.group_by {
        for e in exprs {
            expr_walk(e, f);
        }
    }
    if let Some(having) = &select.having {
        expr_walk(having, f);
    }
}

fn table_factor_exprs(tf: &TableFactor, f: &mut impl FnMut(&Expr)) {
    match tf {
        TableFactor::Derived { subquery, .. } => query_exprs(subquery, f),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            table_factor_exprs(&table_with_joins.relation, f);
            for join in &table_with_joins.joins {
                table_factor_exprs(&join.relation, f);
                join_constraint_exprs(&join.join_operator, f);
            }
        }
        _ => {}
    }
}

fn join_constraint_exprs(op: &JoinOperator, f: &mut impl FnMut(&Expr)) {
    use sqlparser::ast::JoinConstraint;

    let constraint = match op {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c) => Some(c),
        _ => None,
    };
    if let Some(JoinConstraint::On(e)) = constraint {
        expr_walk(e, f);
    }
}

/// Depth-first walk of one expression tree, descending into subqueries.
pub(crate) fn expr_walk(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);

    match expr {
        Expr::BinaryOp { left, right, .. } => {
            expr_walk(left, f);
            expr_walk(right, f);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::IsTrue(expr)
        | Expr::IsNotTrue(expr)
        | Expr::IsFalse(expr)
        | Expr::IsNotFalse(expr)
        | Expr::IsUnknown(expr)
        | Expr::IsNotUnknown(expr) => expr_walk(expr, f),
        Expr::IsDistinctFrom(a, b) | Expr::IsNotDistinctFrom(a, b) => {
            expr_walk(a, f);
            expr_walk(b, f);
        }
        Expr::InList { expr, list, .. } => {
            expr_walk(expr, f);
            for e in list {
                expr_walk(e, f);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            expr_walk(expr, f);
            query_exprs(subquery, f);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            expr_walk(expr, f);
            expr_walk(low, f);
            expr_walk(high, f);
        }
        Expr::Like { expr, pattern, .. }
        | Expr::ILike { expr, pattern, .. }
        | Expr::SimilarTo { expr, pattern, .. } => {
            expr_walk(expr, f);
            expr_walk(pattern, f);
        }
        Expr::Cast { expr, .. } => expr_walk(expr, f),
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            if let Some(op) = operand {
                expr_walk(op, f);
            }
            for c in conditions {
                expr_walk(c, f);
            }
            for r in results {
                expr_walk(r, f);
            }
            if let Some(e) = else_result {
                expr_walk(e, f);
            }
        }
        Expr::Function(func) => {
            for arg in &func.args {
                if let FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                | FunctionArg::Named {
                    arg: FunctionArgExpr::Expr(e),
                    ..
                } = arg
                {
                    expr_walk(e, f);
                }
            }
            if let Some(WindowType::WindowSpec(spec)) = &func.over {
                for e in &spec.partition_by {
                    expr_walk(e, f);
                }
                for ob in &spec.order_by {
                    expr_walk(&ob.expr, f);
                }
            }
        }
        Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => query_exprs(subquery, f),
        Expr::Tuple(exprs) => {
            for e in exprs {
                expr_walk(e, f);
            }
        }
        Expr::AnyOp { left, right, .. } | Expr::AllOp { left, right, .. } => {
            expr_walk(left, f);
            expr_walk(right, f);
        }
        _ => {}
    }
}

/// Visit every JOIN in the statement, nested queries included.
pub(crate) fn for_each_join(stmt: &Statement, f: &mut impl FnMut(&Join)) {
    if let Statement::Query(q) = stmt {
        query_joins(q, f);
    }
}

fn query_joins(q: &Query, f: &mut impl FnMut(&Join)) {
    if let Some(with) = &q.with {
        for cte in &with.cte_tables {
            query_joins(&cte.query, f);
        }
    }
    set_expr_joins(&q.body, f);
}

fn set_expr_joins(body: &SetExpr, f: &mut impl FnMut(&Join)) {
    match body {
        SetExpr::Select(select) => {
            for twj in &select.from {
                table_factor_joins(&twj.relation, f);
                for join in &twj.joins {
                    f(join);
                    table_factor_joins(&join.relation, f);
                }
            }
            // Subqueries in WHERE/HAVING can themselves contain joins.
            if let Some(sel) = &select.selection {
                expr_queries(sel, &mut |sub| query_joins(sub, f));
            }
            if let Some(having) = &select.having {
                expr_queries(having, &mut |sub| query_joins(sub, f));
            }
        }
        SetExpr::Query(q) => query_joins(q, f),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_joins(left, f);
            set_expr_joins(right, f);
        }
        _ => {}
    }
}

fn table_factor_joins(tf: &TableFactor, f: &mut impl FnMut(&Join)) {
    match tf {
        TableFactor::Derived { subquery, .. } => query_joins(subquery, f),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            table_factor_joins(&table_with_joins.relation, f);
            for join in &table_with_joins.joins {
                f(join);
                table_factor_joins(&join.relation, f);
            }
        }
        _ => {}
    }
}

/// Visit the immediate subqueries inside one expression tree.
fn expr_queries(expr: &Expr, f: &mut impl FnMut(&Query)) {
    expr_walk(expr, &mut |e| match e {
        Expr::Subquery(q) | Expr::Exists { subquery: q, .. } => f(q),
        Expr::InSubquery { subquery: q, .. } => f(q),
        _ => {}
    });
}

/// Count UNION set operations anywhere in the statement.
pub(crate) fn count_unions(stmt: &Statement) -> usize {
    let mut count = 0;
    if let Statement::Query(q) = stmt {
        query_unions(q, &mut count);
    }
    count
}

fn query_unions(q: &Query, count: &mut usize) {
    if let Some(with) = &q.with {
        for cte in &with.cte_tables {
            query_unions(&cte.query, count);
        }
    }
    set_expr_unions(&q.body, count);
}

fn set_expr_unions(body: &SetExpr, count: &mut usize) {
    match body {
        SetExpr::SetOperation {
            op, left, right, ..
        } => {
            if *op == sqlparser::ast::SetOperator::Union {
                *count += 1;
            }
            set_expr_unions(left, count);
            set_expr_unions(right, count);
        }
        SetExpr::Select(select) => {
            for twj in &select.from {
                if let TableFactor::Derived { subquery, .. } = &twj.relation {
                    query_unions(subquery, count);
                }
                for join in &twj.joins {
                    if let TableFactor::Derived { subquery, .. } = &join.relation {
                        query_unions(subquery, count);
                    }
                }
            }
        }
        SetExpr::Query(q) => query_unions(q, count),
        _ => {}
    }
}

/// Maximum subquery nesting depth below the statement; 0 when flat.
pub(crate) fn subquery_depth(stmt: &Statement) -> usize {
    match stmt {
        Statement::Query(q) => query_depth(q),
        _ => 0,
    }
}

fn query_depth(q: &Query) -> usize {
    let mut max = 0usize;

    if let Some(with) = &q.with {
        for cte in &with.cte_tables {
            max = max.max(query_depth(&cte.query));
        }
    }
    max.max(set_expr_depth(&q.body))
}

fn set_expr_depth(body: &SetExpr) -> usize {
    match body {
        SetExpr::Select(select) => {
            let mut max = 0usize;
            for twj in &select.from {
                max = max.max(table_factor_depth(&twj.relation));
                for join in &twj.joins {
                    max = max.max(table_factor_depth(&join.relation));
                }
            }
            for opt in [&select.selection, &select.having] {
                if let Some(e) = opt {
                    expr_queries(e, &mut |sub| {
                        let d = 1 + query_depth(sub);
                        if d > max {
                            max = d;
                        }
                    });
                }
            }
            max
        }
        SetExpr::Query(q) => query_depth(q),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_depth(left).max(set_expr_depth(right))
        }
        _ => 0,
    }
}

fn table_factor_depth(tf: &TableFactor) -> usize {
    match tf {
        TableFactor::Derived { subquery, .. } => 1 + query_depth(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            let mut max = table_factor_depth(&table_with_joins.relation);
            for join in &table_with_joins.joins {
                max = max.max(table_factor_depth(&join.relation));
            }
            max
        }
        _ => 0,
    }
}
