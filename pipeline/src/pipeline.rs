use std::sync::Arc;
use std::time::Instant;

use common::config::ProxyConfig;
use common::log::query_log::QueryLog;

use crate::analyzer::SqlAnalyzer;
use crate::envelope::QueryEnvelope;
use crate::error::PipelineError;
use crate::executor::{BackendColumn, BackendExecutor};
use crate::format;
use crate::gate::{CapabilityDetector, WriteGate};
use crate::normalize::{self, CellValue};
use crate::transform::{
    info_schema, info_schema::InfoSchemaRewrite, paren_unwrap, TransformationKind,
    TransformationRecord, Transformer,
};
use crate::validate::TemporalValidator;

/// Shared handles every component receives at construction; the pipeline
/// has no process-wide mutable state.
#[derive(Clone)]
pub struct CoreContext {
    pub config: Arc<ProxyConfig>,
    pub query_log: Arc<QueryLog>,
}

impl CoreContext {
    pub fn new(config: Arc<ProxyConfig>, query_log: Arc<QueryLog>) -> Self {
        CoreContext { config, query_log }
    }
}

/// Successful result: the backend's answer for the final SQL, normalized.
#[derive(Debug)]
pub struct QueryReply {
    pub columns: Vec<BackendColumn>,
    pub rows: Vec<Vec<CellValue>>,
    pub transformed: bool,
    pub total_ms: f64,
    pub transformations: Vec<TransformationRecord>,
}

/// Rejection with the formatted text the client will see.
#[derive(Debug)]
pub struct QueryFailure {
    pub error: PipelineError,
    pub user_message: String,
    pub transformations_attempted: Vec<TransformationRecord>,
}

/// Exactly one of these per query, always.
#[derive(Debug)]
pub enum PipelineResult {
    Success(QueryReply),
    Failure(QueryFailure),
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success(_))
    }
}

/// The query processing pipeline: gates, transforms, validation,
/// execution, normalization, in that order. Owns its components; the
/// executor is shared with the rest of the process.
pub struct QueryPipeline {
    ctx: CoreContext,
    analyzer: SqlAnalyzer,
    write_gate: WriteGate,
    capability: CapabilityDetector,
    transformer: Transformer,
    validator: TemporalValidator,
    executor: Arc<dyn BackendExecutor>,
}

impl QueryPipeline {
    pub fn new(ctx: CoreContext, executor: Arc<dyn BackendExecutor>) -> Self {
        let config = ctx.config.clone();
        QueryPipeline {
            analyzer: SqlAnalyzer::new(),
            write_gate: WriteGate::new(config.clone()),
            capability: CapabilityDetector::new(config.clone()),
            transformer: Transformer::new(config.clone()),
            validator: TemporalValidator::new(config),
            executor,
            ctx,
        }
    }

    pub fn process(&self, envelope: &QueryEnvelope) -> PipelineResult {
        let sql = envelope.raw_sql.trim();
        let started = Instant::now();

        self.ctx.query_log.log_received(
            &envelope.query_id,
            &envelope.connection_id,
            &envelope.source_address,
            sql,
        );

        // Metadata fast path: SHOW/DESCRIBE/USE/SET and the
        // INFORMATION_SCHEMA lookups BI clients probe with.
        if self.analyzer.is_metadata(sql) || info_schema::applies(sql) {
            return self.run_metadata(envelope, sql, started);
        }

        let mut records: Vec<TransformationRecord> = Vec::new();

        if let Err(err) = self.write_gate.check(sql) {
            return self.reject(envelope, sql, err, records);
        }

        // Textual paren unwrap happens before parsing; parsers choke on a
        // parenthesized top-level SELECT as much as the backend does.
        let mut current_sql = sql.to_string();
        let mut next_sequence = 1;
        if let Some(unwrapped) = paren_unwrap::unwrap(sql) {
            self.ctx.query_log.log_transformation(
                &envelope.query_id,
                TransformationKind::ParenUnwrap.as_str(),
                sql,
                &unwrapped,
            );
            records.push(TransformationRecord {
                sequence: next_sequence,
                kind: TransformationKind::ParenUnwrap,
                before_sql: sql.to_string(),
                after_sql: unwrapped.clone(),
                details: None,
            });
            next_sequence += 1;
            current_sql = unwrapped;
        }

        let ast = match self.analyzer.parse(&current_sql) {
            Ok(ast) => ast,
            Err(err) => return self.reject(envelope, &current_sql, err, records),
        };

        if let Err(err) = self.capability.check(&ast) {
            return self.reject(envelope, &current_sql, err, records);
        }

        let outcome = match self.transformer.transform(&current_sql, ast, next_sequence) {
            Ok(outcome) => outcome,
            Err(err) => return self.reject(envelope, &current_sql, err, records),
        };
        for record in &outcome.records {
            self.ctx.query_log.log_transformation(
                &envelope.query_id,
                record.kind.as_str(),
                &record.before_sql,
                &record.after_sql,
            );
        }
        records.extend(outcome.records);
        let final_sql = outcome.final_sql;
        let final_ast = outcome.final_ast;

        if let Err(err) = self.validator.validate(&final_ast) {
            return self.reject(envelope, &final_sql, err, records);
        }

        self.execute(envelope, &final_sql, records, started)
    }

    fn run_metadata(
        &self,
        envelope: &QueryEnvelope,
        sql: &str,
        started: Instant,
    ) -> PipelineResult {
        let mut records = Vec::new();
        let mut final_sql = sql.to_string();

        if info_schema::applies(sql) {
            match info_schema::rewrite(sql) {
                InfoSchemaRewrite::Rewritten(show) => {
                    self.ctx.query_log.log_transformation(
                        &envelope.query_id,
                        TransformationKind::InfoSchemaRewrite.as_str(),
                        sql,
                        &show,
                    );
                    records.push(TransformationRecord {
                        sequence: 1,
                        kind: TransformationKind::InfoSchemaRewrite,
                        before_sql: sql.to_string(),
                        after_sql: show.clone(),
                        details: None,
                    });
                    final_sql = show;
                }
                InfoSchemaRewrite::Passthrough => {}
                InfoSchemaRewrite::Empty => {
                    // Not expressible as SHOW: an empty result silences
                    // the probe without a backend round-trip.
                    self.ctx.query_log.log_success(
                        &envelope.query_id,
                        sql,
                        0.0,
                        0,
                        false,
                    );
                    return PipelineResult::Success(QueryReply {
                        columns: vec![],
                        rows: vec![],
                        transformed: false,
                        total_ms: elapsed_ms(started),
                        transformations: vec![],
                    });
                }
            }
        } else {
            self.ctx
                .query_log
                .log_metadata_passthrough(&envelope.query_id, sql);
        }

        self.execute(envelope, &final_sql, records, started)
    }

    fn execute(
        &self,
        envelope: &QueryEnvelope,
        final_sql: &str,
        records: Vec<TransformationRecord>,
        started: Instant,
    ) -> PipelineResult {
        let transformed = !records.is_empty();

        match self.executor.execute(final_sql) {
            Ok(output) => {
                let mut columns = output.columns;
                let mut rows = normalize::normalize_rows(&columns, output.rows);
                normalize::repair_shape(&mut columns, &mut rows);

                self.ctx.query_log.log_success(
                    &envelope.query_id,
                    final_sql,
                    output.elapsed_ms,
                    rows.len(),
                    transformed,
                );

                PipelineResult::Success(QueryReply {
                    columns,
                    rows,
                    transformed,
                    total_ms: elapsed_ms(started),
                    transformations: records,
                })
            }
            Err(backend_err) => {
                let err = PipelineError::Backend {
                    code: backend_err.code,
                    message: backend_err.message.clone(),
                };
                self.ctx
                    .query_log
                    .log_error(&envelope.query_id, &backend_err.message, final_sql);
                self.fail(err, records)
            }
        }
    }

    fn reject(
        &self,
        envelope: &QueryEnvelope,
        sql: &str,
        err: PipelineError,
        records: Vec<TransformationRecord>,
    ) -> PipelineResult {
        self.ctx
            .query_log
            .log_rejected(&envelope.query_id, err.reason(), sql);
        self.fail(err, records)
    }

    fn fail(&self, err: PipelineError, records: Vec<TransformationRecord>) -> PipelineResult {
        PipelineResult::Failure(QueryFailure {
            user_message: format::format_error(&err),
            error: err,
            transformations_attempted: records,
        })
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::executor::{BackendError, ExecOutput, MockExecutor};

    fn pipeline_with(
        config: ProxyConfig,
    ) -> (QueryPipeline, Arc<MockExecutor>) {
        let executor = Arc::new(MockExecutor::new());
        let ctx = CoreContext::new(Arc::new(config), Arc::new(QueryLog::new()));
        let pipeline = QueryPipeline::new(ctx, executor.clone());
        (pipeline, executor)
    }

    fn pipeline() -> (QueryPipeline, Arc<MockExecutor>) {
        pipeline_with(ProxyConfig::default())
    }

    fn envelope(sql: &str) -> QueryEnvelope {
        QueryEnvelope::new(sql, "conn-test", "127.0.0.1")
    }

    fn kinds(records: &[TransformationRecord]) -> Vec<TransformationKind> {
        records.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_tableau_wrapper_unwrap_end_to_end() {
        let (pipeline, executor) = pipeline();
        executor.push_output(MockExecutor::sample_output());

        let sql = "SELECT * FROM (SELECT id, SUM(amt) AS t FROM sales WHERE cob_date='2024-01-15') s WHERE id>10";
        let result = pipeline.process(&envelope(sql));

        assert_eq!(
            executor.calls(),
            vec!["SELECT id, SUM(amt) AS t FROM sales WHERE cob_date = '2024-01-15' AND id > 10 GROUP BY id"]
        );
        match result {
            PipelineResult::Success(reply) => {
                assert!(reply.transformed);
                assert_eq!(
                    kinds(&reply.transformations),
                    vec![
                        TransformationKind::SubqueryUnwrap,
                        TransformationKind::GroupByFix
                    ]
                );
                assert_eq!(
                    reply.transformations[1].details.as_deref(),
                    Some("columns added: id")
                );
                assert_eq!(reply.rows.len(), 2);
                // DECIMAL column came back as text and left as double
                assert_eq!(reply.rows[0][1], CellValue::Double(10.5));
            }
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_parenthesized_limit_probe() {
        let (pipeline, executor) = pipeline();

        let sql = "(SELECT c1,c2 FROM t WHERE cob_date='2024-01-15') LIMIT 0";
        let result = pipeline.process(&envelope(sql));

        assert_eq!(
            executor.calls(),
            vec!["SELECT c1,c2 FROM t WHERE cob_date='2024-01-15' LIMIT 0"]
        );
        match result {
            PipelineResult::Success(reply) => {
                assert_eq!(
                    kinds(&reply.transformations),
                    vec![TransformationKind::ParenUnwrap]
                );
            }
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_missing_date_filter_never_reaches_backend() {
        let (pipeline, executor) = pipeline();

        let result =
            pipeline.process(&envelope("SELECT category, SUM(amount) FROM sales GROUP BY category"));

        assert_eq!(executor.call_count(), 0);
        match result {
            PipelineResult::Failure(f) => {
                assert_eq!(f.error, PipelineError::MissingDateFilter);
                assert!(f.user_message.contains("cob_date filter is mandatory"));
            }
            PipelineResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_disallowed_join() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope(
            "SELECT a.id FROM s a JOIN p b ON a.pid=b.id WHERE a.cob_date='2024-01-15'",
        ));

        assert_eq!(executor.call_count(), 0);
        match result {
            PipelineResult::Failure(f) => {
                assert_eq!(
                    f.error,
                    PipelineError::UnsupportedJoin {
                        kinds: vec!["INNER JOIN".to_string()]
                    }
                );
            }
            PipelineResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_count_rejection_with_guidance() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope(
            "SELECT category, COUNT(*) FROM sales WHERE cob_date='2024-01-15' GROUP BY category",
        ));

        assert_eq!(executor.call_count(), 0);
        match result {
            PipelineResult::Failure(f) => {
                assert_eq!(
                    f.error,
                    PipelineError::UnsupportedFunction {
                        names: vec!["COUNT".to_string()]
                    }
                );
                assert!(f.user_message.contains("SUM(1)"));
            }
            PipelineResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_information_schema_tables_rewrite() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA='appdb'",
        ));

        assert_eq!(executor.calls(), vec!["SHOW TABLES FROM appdb"]);
        match result {
            PipelineResult::Success(reply) => {
                assert!(reply.transformed);
                assert_eq!(
                    kinds(&reply.transformations),
                    vec![TransformationKind::InfoSchemaRewrite]
                );
            }
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_information_schema_too_complex_returns_empty() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE DATA_TYPE='enum'",
        ));

        assert_eq!(executor.call_count(), 0);
        match result {
            PipelineResult::Success(reply) => {
                assert!(reply.columns.is_empty());
                assert!(reply.rows.is_empty());
                assert!(!reply.transformed);
            }
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_incomplete_group_by_completed() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope(
            "SELECT category, region, SUM(amount) FROM sales WHERE cob_date='2024-01-15' GROUP BY category",
        ));

        let sent = executor.calls();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].ends_with("GROUP BY category, region"));
        match result {
            PipelineResult::Success(reply) => {
                assert_eq!(
                    kinds(&reply.transformations),
                    vec![TransformationKind::GroupByFix]
                );
                assert_eq!(
                    reply.transformations[0].details.as_deref(),
                    Some("columns added: region")
                );
            }
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_write_blocked() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope("INSERT INTO sales VALUES (1,100)"));

        assert_eq!(executor.call_count(), 0);
        match result {
            PipelineResult::Failure(f) => {
                assert_eq!(
                    f.error,
                    PipelineError::WriteBlocked {
                        operation: "INSERT".to_string()
                    }
                );
            }
            PipelineResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_parse_error() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope("SELEKT id FROM t"));

        assert_eq!(executor.call_count(), 0);
        match result {
            PipelineResult::Failure(f) => {
                assert!(matches!(f.error, PipelineError::Parse { .. }));
            }
            PipelineResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_multi_statement_rejected() {
        let (pipeline, executor) = pipeline();
        let result = pipeline.process(&envelope(
            "SELECT id FROM t WHERE cob_date='2024-01-15'; SELECT 2",
        ));
        assert_eq!(executor.call_count(), 0);
        assert!(!result.is_success());
    }

    #[test]
    fn test_backend_error_surfaces() {
        let (pipeline, executor) = pipeline();
        executor.push_error(BackendError::driver(Some(1146), "Table 't' doesn't exist"));

        let result = pipeline.process(&envelope("SELECT id FROM t WHERE cob_date='2024-01-15'"));

        match result {
            PipelineResult::Failure(f) => {
                assert_eq!(
                    f.error,
                    PipelineError::Backend {
                        code: Some(1146),
                        message: "Table 't' doesn't exist".to_string()
                    }
                );
                assert!(f.user_message.contains("(Error 1146)"));
            }
            PipelineResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_metadata_show_passthrough() {
        let (pipeline, executor) = pipeline();

        let result = pipeline.process(&envelope("SHOW TABLES"));

        assert_eq!(executor.calls(), vec!["SHOW TABLES"]);
        assert!(result.is_success());
    }

    #[test]
    fn test_schemata_passthrough_unchanged() {
        let (pipeline, executor) = pipeline();

        pipeline.process(&envelope(
            "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA",
        ));

        assert_eq!(
            executor.calls(),
            vec!["SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA"]
        );
    }

    #[test]
    fn test_determinism_same_input_same_plan() {
        let sql = "SELECT * FROM (SELECT id, SUM(amt) AS t FROM sales WHERE cob_date='2024-01-15') s WHERE id>10";

        let (p1, e1) = pipeline();
        e1.push_output(MockExecutor::sample_output());
        let r1 = p1.process(&envelope(sql));

        let (p2, e2) = pipeline();
        e2.push_output(MockExecutor::sample_output());
        let r2 = p2.process(&envelope(sql));

        assert_eq!(e1.calls(), e2.calls());
        match (r1, r2) {
            (PipelineResult::Success(a), PipelineResult::Success(b)) => {
                assert_eq!(a.transformations, b.transformations);
                assert_eq!(a.columns, b.columns);
                assert_eq!(a.rows, b.rows);
            }
            _ => panic!("expected two successes"),
        }
    }

    #[test]
    fn test_final_sql_is_stable_under_retransform() {
        let sql = "SELECT * FROM (SELECT category, SUM(amount) FROM sales WHERE cob_date='2024-01-15') s";

        let (p1, e1) = pipeline();
        p1.process(&envelope(sql));
        let final_sql = e1.calls().remove(0);

        // feeding the final SQL back through produces no further rewrites
        let (p2, e2) = pipeline();
        let result = p2.process(&envelope(&final_sql));
        assert_eq!(e2.calls(), vec![final_sql]);
        match result {
            PipelineResult::Success(reply) => assert!(!reply.transformed),
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_shape_mismatch_repaired() {
        let (pipeline, executor) = pipeline();
        executor.push_output(ExecOutput {
            columns: vec![BackendColumn::new("a", "INT")],
            rows: vec![vec![
                CellValue::Int(1),
                CellValue::Text("extra".to_string()),
            ]],
            elapsed_ms: 0.5,
        });

        let result = pipeline.process(&envelope("SELECT a FROM t WHERE cob_date='2024-01-15'"));

        match result {
            PipelineResult::Success(reply) => {
                assert_eq!(reply.columns.len(), 2);
                assert_eq!(reply.columns[1].name, "column_2");
                assert_eq!(reply.rows[0].len(), 2);
            }
            PipelineResult::Failure(f) => panic!("unexpected failure: {}", f.user_message),
        }
    }

    #[test]
    fn test_counters_track_lifecycle() {
        let (pipeline, _executor) = pipeline();
        let log = pipeline.ctx.query_log.clone();

        pipeline.process(&envelope("SELECT id FROM t WHERE cob_date='2024-01-15'"));
        pipeline.process(&envelope("INSERT INTO t VALUES (1)"));

        let snapshot = log.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.rejected, 1);
    }
}
