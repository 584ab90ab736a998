use std::collections::HashMap;
use std::io;
use std::io::{Read, Write};
use std::sync::Arc;

use msql_srv::{
    ErrorKind, InitWriter, MysqlShim, ParamParser, QueryResultWriter, StatementMetaWriter,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use pipeline::format::format_error;
use pipeline::{
    BackendColumn, BackendExecutor, CellValue, CoreContext, PipelineError, PipelineResult,
    QueryEnvelope, QueryKind, QueryPipeline,
};

use crate::local::{self, LocalAnswer};
use crate::wire;

static SET_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^SET\s+(?:SESSION\s+|GLOBAL\s+)?(@?@?[A-Za-z0-9_.]+)\s*=\s*(.+)$").unwrap()
});
static SET_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^SET\s+(NAMES|CHARACTER\s+SET)\b").unwrap());

/// Per-client session: current schema, session variables, and the
/// pipeline every non-local statement goes through. One instance per
/// connection, owned by that connection's thread.
pub struct ProxySession {
    ctx: CoreContext,
    pipeline: QueryPipeline,
    connection_id: u32,
    connection_tag: String,
    source_address: String,
    current_schema: Option<String>,
    session_vars: HashMap<String, String>,
}

impl ProxySession {
    pub fn new(
        ctx: CoreContext,
        executor: Arc<dyn BackendExecutor>,
        connection_id: u32,
        source_address: String,
    ) -> Self {
        let pipeline = QueryPipeline::new(ctx.clone(), executor);
        ProxySession {
            pipeline,
            connection_id,
            connection_tag: format!("conn-{connection_id}"),
            source_address,
            current_schema: none_if_empty(&ctx.config.backend.database),
            session_vars: HashMap::new(),
            ctx,
        }
    }

    pub fn connection_tag(&self) -> &str {
        &self.connection_tag
    }

    pub fn current_schema(&self) -> Option<&str> {
        self.current_schema.as_deref()
    }

    pub fn session_var(&self, name: &str) -> Option<&str> {
        self.session_vars.get(name).map(String::as_str)
    }

    /// `USE x`: blocked list first, then the allow list; never forwarded.
    fn use_schema(&mut self, schema: &str) -> Result<(), String> {
        let schema = schema.trim().trim_matches('`').trim_end_matches(';');
        if schema.is_empty() {
            return Err("no schema named".to_string());
        }

        if self.ctx.config.is_schema_allowed(schema) {
            info!(connection = %self.connection_tag, schema, "schema changed");
            self.current_schema = Some(schema.to_string());
            Ok(())
        } else {
            Err(format_error(&PipelineError::SchemaBlocked {
                schema: schema.to_string(),
            }))
        }
    }

    /// All SET variants succeed locally and never reach the backend.
    /// Assignments land in the session-variable bag; `SET NAMES` /
    /// `CHARACTER SET` are acknowledged without state.
    fn record_set(&mut self, sql: &str) {
        if SET_CHARSET.is_match(sql) {
            return;
        }
        if let Some(caps) = SET_ASSIGNMENT.captures(sql) {
            let name = caps.get(1).unwrap().as_str().to_string();
            let value = caps.get(2).unwrap().as_str().trim().to_string();
            debug!(connection = %self.connection_tag, name = %name, "session variable set");
            self.session_vars.insert(name, value);
        }
    }
}

impl<W: Read + Write> MysqlShim<W> for ProxySession {
    type Error = io::Error;

    fn on_prepare(
        &mut self,
        _query: &str,
        info: StatementMetaWriter<'_, W>,
    ) -> Result<(), Self::Error> {
        info.error(
            ErrorKind::ER_NOT_SUPPORTED_YET,
            b"prepared statements are not supported; use the text protocol",
        )
    }

    fn on_execute(
        &mut self,
        _id: u32,
        _params: ParamParser<'_>,
        results: QueryResultWriter<'_, W>,
    ) -> Result<(), Self::Error> {
        results.error(
            ErrorKind::ER_NOT_SUPPORTED_YET,
            b"prepared statements are not supported; use the text protocol",
        )
    }

    fn on_close(&mut self, _stmt: u32) {}

    fn on_init(&mut self, schema: &str, writer: InitWriter<'_, W>) -> Result<(), Self::Error> {
        match self.use_schema(schema) {
            Ok(()) => writer.ok(),
            Err(message) => writer.error(ErrorKind::ER_BAD_DB_ERROR, message.as_bytes()),
        }
    }

    fn on_query(
        &mut self,
        sql: &str,
        results: QueryResultWriter<'_, W>,
    ) -> Result<(), Self::Error> {
        let trimmed = sql.trim().trim_end_matches(';').trim();
        if trimmed.is_empty() {
            return results.completed(0, 0);
        }

        match QueryKind::of(trimmed) {
            QueryKind::Set => {
                self.record_set(trimmed);
                return results.completed(0, 0);
            }
            QueryKind::Use => {
                let schema = trimmed.split_whitespace().nth(1).unwrap_or("");
                return match self.use_schema(schema) {
                    Ok(()) => results.completed(0, 0),
                    Err(message) => {
                        results.error(ErrorKind::ER_BAD_DB_ERROR, message.as_bytes())
                    }
                };
            }
            _ => {}
        }

        if let Some(answer) =
            local::answer(trimmed, self.connection_id, self.current_schema.as_deref())
        {
            return match answer {
                LocalAnswer::Ok => results.completed(0, 0),
                LocalAnswer::Rows { columns, rows } => write_rows(results, &columns, &rows),
            };
        }

        let envelope = QueryEnvelope::new(trimmed, &self.connection_tag, &self.source_address);
        match self.pipeline.process(&envelope) {
            PipelineResult::Success(reply) => write_rows(results, &reply.columns, &reply.rows),
            // the session survives every per-query failure
            PipelineResult::Failure(failure) => results.error(
                wire::error_kind(&failure.error),
                failure.user_message.as_bytes(),
            ),
        }
    }
}

fn write_rows<W: Read + Write>(
    results: QueryResultWriter<'_, W>,
    columns: &[BackendColumn],
    rows: &[Vec<CellValue>],
) -> io::Result<()> {
    if columns.is_empty() {
        return results.completed(0, 0);
    }

    let cols = wire::columns(columns);
    let mut rw = results.start(&cols)?;
    for row in rows {
        for cell in row {
            wire::write_cell(&mut rw, cell)?;
        }
        rw.end_row()?;
    }
    rw.finish()
}

fn none_if_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::config::ProxyConfig;
    use common::log::query_log::QueryLog;
    use pipeline::executor::MockExecutor;

    fn session() -> ProxySession {
        session_with(ProxyConfig::default())
    }

    fn session_with(config: ProxyConfig) -> ProxySession {
        let ctx = CoreContext::new(Arc::new(config), Arc::new(QueryLog::new()));
        ProxySession::new(ctx, Arc::new(MockExecutor::new()), 1, "127.0.0.1".to_string())
    }

    #[test]
    fn test_use_allowed_schema_updates_state() {
        let mut s = session();
        assert!(s.use_schema("appdb").is_ok());
        assert_eq!(s.current_schema(), Some("appdb"));
    }

    #[test]
    fn test_use_blocked_schema_rejected() {
        let mut s = session();
        let message = s.use_schema("mysql").unwrap_err();
        assert!(message.contains("'mysql'"));
        assert_eq!(s.current_schema(), None);
    }

    #[test]
    fn test_use_respects_allow_list() {
        let mut config = ProxyConfig::default();
        config.business_rules.allowed_schemas = vec!["appdb".to_string()];
        let mut s = session_with(config);

        assert!(s.use_schema("appdb").is_ok());
        assert!(s.use_schema("otherdb").is_err());
    }

    #[test]
    fn test_use_strips_backticks() {
        let mut s = session();
        assert!(s.use_schema("`appdb`").is_ok());
        assert_eq!(s.current_schema(), Some("appdb"));
    }

    #[test]
    fn test_set_user_variable_recorded() {
        let mut s = session();
        s.record_set("SET @report_date = '2024-01-15'");
        assert_eq!(s.session_var("@report_date"), Some("'2024-01-15'"));
    }

    #[test]
    fn test_set_session_variable_recorded() {
        let mut s = session();
        s.record_set("SET SESSION sql_mode = 'ANSI'");
        assert_eq!(s.session_var("sql_mode"), Some("'ANSI'"));
    }

    #[test]
    fn test_set_names_is_stateless_ok() {
        let mut s = session();
        s.record_set("SET NAMES utf8mb4");
        s.record_set("SET CHARACTER SET utf8");
        assert!(s.session_vars.is_empty());
    }
}
