//! User-facing error text. One canonical template per error kind; this is
//! the only place wire-visible message strings are produced.

use crate::error::PipelineError;

/// Render the message the client sees in its ERR packet.
pub fn format_error(err: &PipelineError) -> String {
    match err {
        PipelineError::WriteBlocked { operation } => format_write_blocked(operation),
        PipelineError::Parse { detail } => format_parse_error(detail),
        PipelineError::UnsupportedJoin { kinds } => format_join_error(kinds),
        PipelineError::UnsupportedUnion { count } => format_union_error(*count),
        PipelineError::UnsupportedWindow { names } => format_window_error(names),
        PipelineError::UnsupportedFunction { names } => format_function_error(names),
        PipelineError::SubqueryTooComplex { depth, max } => {
            format_complex_subquery_error(*depth, *max)
        }
        PipelineError::MissingDateFilter => format_missing_date_filter(),
        PipelineError::SchemaBlocked { schema } => format_schema_blocked(schema),
        PipelineError::Backend { code, message } => format_backend_error(*code, message),
        PipelineError::Internal { detail } => format_internal_error(detail),
    }
}

fn format_join_error(kinds: &[String]) -> String {
    format!(
        "MySQL Proxy Error: JOINs are not supported

Your query contains table joins which are not supported by the backend MySQL server.

Detected: {}

Suggestions:
  - Create a denormalized view or table that combines the required data
  - Use your BI tool's data blending feature instead of SQL joins
  - Contact your database administrator about enabling JOIN support

Feature: JOINs (INNER, LEFT, RIGHT, OUTER, CROSS)
Status: Not Supported",
        kinds.join(", ")
    )
}

fn format_union_error(count: usize) -> String {
    format!(
        "MySQL Proxy Error: UNIONs are not supported

Your query contains {count} UNION operation(s) which are not supported by the backend.

Suggestions:
  - Split into separate queries and combine results in your BI tool
  - Create a unified view in the database
  - Use separate data sources

Feature: UNION, UNION ALL
Status: Not Supported"
    )
}

fn format_window_error(names: &[String]) -> String {
    format!(
        "MySQL Proxy Error: Window functions are not supported

Your query uses window functions which are not supported by the backend.

Detected functions: {}

Suggestions:
  - Use your BI tool's table calculations for ranking and windowing
  - Pre-calculate these values in a database view

Feature: Window Functions (ROW_NUMBER, RANK, DENSE_RANK, OVER clause)
Status: Not Supported",
        names.join(", ")
    )
}

fn format_function_error(names: &[String]) -> String {
    if names.iter().any(|n| n.eq_ignore_ascii_case("COUNT")) {
        return "MySQL Proxy Error: COUNT() function is not supported

Your query uses the COUNT() aggregation function which is not supported by the backend.

Alternative: Use SUM(1) instead of COUNT(*)
  Example: SELECT category, SUM(1) AS record_count
           FROM sales
           WHERE cob_date='2024-01-15'
           GROUP BY category

Alternative: Use SUM(CASE) instead of COUNT(column)
  Example: SELECT category, SUM(CASE WHEN customer_id IS NOT NULL THEN 1 ELSE 0 END)
           FROM sales
           WHERE cob_date='2024-01-15'
           GROUP BY category

Or let the BI tool handle the counting:
  - Remove COUNT from Custom SQL
  - Drag the dimension to Rows
  - Records are counted automatically

Feature: COUNT() Aggregation
Status: Not Supported
Alternative: SUM(1) for counting rows"
            .to_string();
    }

    format!(
        "MySQL Proxy Error: Unsupported function(s): {names}

Your query uses function(s) that are not supported by the backend MySQL server.

Detected: {names}

Suggestions:
  - Check documentation for supported functions
  - Use alternative functions if available
  - Perform calculations in the BI tool instead of SQL

Status: Not Supported",
        names = names.join(", ")
    )
}

fn format_missing_date_filter() -> String {
    "MySQL Proxy Error: cob_date filter is mandatory

All queries must include a cob_date filter in the WHERE clause to ensure temporal consistency.

Required format:
  SELECT column1, column2
  FROM table_name
  WHERE cob_date = '2024-01-15' AND other_conditions...

The cob_date filter ensures your query operates on a specific date's data snapshot.

Business Rule: Mandatory cob_date Filter
Status: Rejected - Add cob_date filter and retry"
        .to_string()
}

fn format_complex_subquery_error(depth: usize, max: usize) -> String {
    format!(
        "MySQL Proxy Error: Query too complex (subquery depth: {depth})

Your query contains nested subqueries that are too complex to flatten.

Maximum allowed depth: {max}
Your query depth: {depth}

Suggestions:
  - Simplify the query by creating intermediate views
  - Break down the query into multiple simpler queries
  - Remove unnecessary subquery nesting

Feature: Nested Subqueries
Status: Limited support (depth <= {max})"
    )
}

fn format_write_blocked(operation: &str) -> String {
    format!(
        "MySQL Proxy Error: Write operations are not permitted

Your query attempts to perform a write operation ({operation}) which is not allowed.

This proxy provides read-only access to the database.

Blocked operations: INSERT, UPDATE, DELETE, DROP, CREATE, ALTER, TRUNCATE, REPLACE, GRANT, REVOKE

Security Policy: Read-Only Access
Status: Rejected"
    )
}

fn format_parse_error(detail: &str) -> String {
    format!(
        "MySQL Proxy Error: Failed to parse SQL query

The query could not be parsed. Please check your SQL syntax.

Error: {detail}

Suggestions:
  - Verify SQL syntax is valid
  - Check for missing or extra parentheses
  - Ensure proper quoting of strings and identifiers

Status: Parse Error"
    )
}

fn format_backend_error(code: Option<u16>, message: &str) -> String {
    let code_str = code.map(|c| format!(" (Error {c})")).unwrap_or_default();

    format!(
        "MySQL Backend Error{code_str}

The backend database returned an error while executing your query.

Error: {message}

This error originated from the backend MySQL server, not the proxy.

Suggestions:
  - Check that all referenced tables and columns exist
  - Verify data types are compatible
  - Ensure your query follows backend SQL limitations

Status: Backend Execution Error"
    )
}

fn format_schema_blocked(schema: &str) -> String {
    format!(
        "MySQL Proxy Error: Access to database '{schema}' is not permitted

The database you're trying to access is blocked by security policy.

Blocked databases: mysql, information_schema, performance_schema, sys

Suggestions:
  - Use an allowed application database
  - Contact your administrator for database access

Security Policy: Database Access Control
Status: Rejected"
    )
}

fn format_internal_error(_detail: &str) -> String {
    // Detail goes to the log, never to the client.
    "MySQL Proxy Error: Internal error

The proxy hit an unexpected error while processing your query. The incident
has been logged.

Status: Internal Error"
        .to_string()
}
