use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement, TableFactor, Value};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::analyzer::walk;

/// Outcome of the INFORMATION_SCHEMA → SHOW rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoSchemaRewrite {
    /// Execute the rewritten SHOW command instead.
    Rewritten(String),
    /// The backend understands this lookup natively; send unchanged.
    Passthrough,
    /// Not expressible as SHOW. The caller answers with an empty result
    /// set instead of bothering the backend (silences client probes).
    Empty,
}

const CONVERTIBLE: [&str; 4] = [
    "INFORMATION_SCHEMA.TABLES",
    "INFORMATION_SCHEMA.COLUMNS",
    "INFORMATION_SCHEMA.SCHEMATA",
    "INFORMATION_SCHEMA.TABLE_CONSTRAINTS",
];

/// Cheap textual screen, run before deciding on the fast path.
pub fn applies(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    CONVERTIBLE.iter().any(|p| upper.contains(p))
}

pub fn rewrite(sql: &str) -> InfoSchemaRewrite {
    match try_rewrite(sql) {
        Some(r) => r,
        None => InfoSchemaRewrite::Empty,
    }
}

fn try_rewrite(sql: &str) -> Option<InfoSchemaRewrite> {
    let statements = Parser::parse_sql(&MySqlDialect {}, sql).ok()?;
    let query = match statements.as_slice() {
        [Statement::Query(q)] => q,
        _ => return None,
    };
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return None,
    };

    let relation = match select.from.as_slice() {
        [twj] if twj.joins.is_empty() => &twj.relation,
        _ => return None,
    };
    let table = match relation {
        TableFactor::Table { name, .. } => name.0.last()?.value.to_ascii_uppercase(),
        _ => return None,
    };

    if table.contains("TABLES") {
        if has_complex_where(select.selection.as_ref(), true) {
            return None;
        }
        let show = match extract_eq_literal(select.selection.as_ref(), "TABLE_SCHEMA") {
            Some(schema) => format!("SHOW TABLES FROM {schema}"),
            None => "SHOW TABLES".to_string(),
        };
        Some(InfoSchemaRewrite::Rewritten(show))
    } else if table.contains("COLUMNS") {
        if has_complex_where(select.selection.as_ref(), false) {
            return None;
        }
        let table_name = extract_eq_literal(select.selection.as_ref(), "TABLE_NAME")?;
        let show = match extract_eq_literal(select.selection.as_ref(), "TABLE_SCHEMA") {
            Some(schema) if !schema.is_empty() => {
                format!("SHOW COLUMNS FROM {schema}.{table_name}")
            }
            _ => format!("SHOW COLUMNS FROM {table_name}"),
        };
        Some(InfoSchemaRewrite::Rewritten(show))
    } else if table.contains("SCHEMATA") {
        // The backend supports INFORMATION_SCHEMA.SCHEMATA natively but
        // not SHOW DATABASES.
        Some(InfoSchemaRewrite::Passthrough)
    } else {
        None
    }
}

/// A predicate on anything but TABLE_NAME / TABLE_SCHEMA (plus TABLE_TYPE
/// for TABLES lookups) cannot be expressed as a SHOW command.
fn has_complex_where(selection: Option<&Expr>, allow_table_type: bool) -> bool {
    let selection = match selection {
        Some(e) => e,
        None => return false,
    };

    let mut complex = false;
    walk::expr_walk(selection, &mut |e| {
        let name = match e {
            Expr::Identifier(ident) => ident.value.to_ascii_uppercase(),
            Expr::CompoundIdentifier(parts) => match parts.last() {
                Some(last) => last.value.to_ascii_uppercase(),
                None => return,
            },
            _ => return,
        };

        if name == "TABLE_TYPE" && allow_table_type {
            return;
        }
        if name != "TABLE_NAME" && name != "TABLE_SCHEMA" {
            complex = true;
        }
    });
    complex
}

/// Find `<column> = '<literal>'` (either operand order) in the WHERE tree.
fn extract_eq_literal(selection: Option<&Expr>, column: &str) -> Option<String> {
    let selection = selection?;

    let mut found = None;
    walk::expr_walk(selection, &mut |e| {
        if found.is_some() {
            return;
        }
        if let Expr::BinaryOp { left, op, right } = e {
            if *op != BinaryOperator::Eq {
                return;
            }
            let pairs = [
                (left.as_ref(), right.as_ref()),
                (right.as_ref(), left.as_ref()),
            ];
            for (col, lit) in pairs {
                if let (Some(name), Some(value)) = (column_name(col), literal_text(lit)) {
                    if name.eq_ignore_ascii_case(column) {
                        found = Some(value);
                        return;
                    }
                }
            }
        }
    });
    found
}

fn column_name(e: &Expr) -> Option<String> {
    match e {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
        _ => None,
    }
}

fn literal_text(e: &Expr) -> Option<String> {
    match e {
        Expr::Value(Value::SingleQuotedString(s)) | Expr::Value(Value::DoubleQuotedString(s)) => {
            Some(s.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tables_with_schema() {
        let sql = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = 'appdb'";
        assert!(applies(sql));
        assert_eq!(
            rewrite(sql),
            InfoSchemaRewrite::Rewritten("SHOW TABLES FROM appdb".to_string())
        );
    }

    #[test]
    fn test_tables_without_schema() {
        let sql = "SELECT * FROM INFORMATION_SCHEMA.TABLES";
        assert_eq!(
            rewrite(sql),
            InfoSchemaRewrite::Rewritten("SHOW TABLES".to_string())
        );
    }

    #[test]
    fn test_tables_table_type_filter_allowed() {
        let sql = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                   WHERE TABLE_SCHEMA = 'appdb' AND TABLE_TYPE = 'BASE TABLE'";
        assert_eq!(
            rewrite(sql),
            InfoSchemaRewrite::Rewritten("SHOW TABLES FROM appdb".to_string())
        );
    }

    #[test]
    fn test_columns_with_table_and_schema() {
        let sql = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
                   WHERE TABLE_SCHEMA = 'appdb' AND TABLE_NAME = 'users'";
        assert_eq!(
            rewrite(sql),
            InfoSchemaRewrite::Rewritten("SHOW COLUMNS FROM appdb.users".to_string())
        );
    }

    #[test]
    fn test_columns_reversed_equality() {
        let sql = "SELECT * FROM INFORMATION_SCHEMA.COLUMNS WHERE 'users' = TABLE_NAME";
        assert_eq!(
            rewrite(sql),
            InfoSchemaRewrite::Rewritten("SHOW COLUMNS FROM users".to_string())
        );
    }

    #[test]
    fn test_columns_without_table_is_empty() {
        let sql = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = 'appdb'";
        assert_eq!(rewrite(sql), InfoSchemaRewrite::Empty);
    }

    #[test]
    fn test_data_type_filter_is_too_complex() {
        let sql = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
                   WHERE TABLE_NAME = 'users' AND DATA_TYPE = 'enum'";
        assert_eq!(rewrite(sql), InfoSchemaRewrite::Empty);
    }

    #[test]
    fn test_schemata_passthrough() {
        let sql = "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA";
        assert!(applies(sql));
        assert_eq!(rewrite(sql), InfoSchemaRewrite::Passthrough);
    }

    #[test]
    fn test_table_constraints_is_empty() {
        let sql = "SELECT * FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS WHERE TABLE_NAME = 'users'";
        assert!(applies(sql));
        assert_eq!(rewrite(sql), InfoSchemaRewrite::Empty);
    }

    #[test]
    fn test_regular_select_does_not_apply() {
        assert!(!applies("SELECT id FROM users WHERE cob_date = '2024-01-15'"));
    }
}
