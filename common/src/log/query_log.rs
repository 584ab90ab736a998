use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info, warn};

/// Query lifecycle logger shared by every session. Emits one structured
/// event per lifecycle step, keyed by `query_id`, and keeps aggregate
/// counters. The counters are the only cross-session mutable state and
/// never gate query processing.
#[derive(Debug, Default)]
pub struct QueryLog {
    received: AtomicU64,
    succeeded: AtomicU64,
    transformed: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of the aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLogSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub transformed: u64,
    pub rejected: u64,
}

impl QueryLog {
    pub fn new() -> Self {
        QueryLog::default()
    }

    pub fn log_received(&self, query_id: &str, connection_id: &str, source: &str, sql: &str) {
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(
            query_id,
            connection_id,
            source,
            status = "RECEIVED",
            query = truncate(sql),
            "query received"
        );
    }

    pub fn log_metadata_passthrough(&self, query_id: &str, sql: &str) {
        debug!(
            query_id,
            status = "METADATA_PASSTHROUGH",
            query = truncate(sql),
            "metadata query passthrough"
        );
    }

    pub fn log_rejected(&self, query_id: &str, reason: &str, sql: &str) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
            query_id,
            status = %format!("REJECTED_{}", reason.to_uppercase()),
            reason,
            query = truncate(sql),
            "query rejected"
        );
    }

    pub fn log_transformation(&self, query_id: &str, kind: &str, before: &str, after: &str) {
        self.transformed.fetch_add(1, Ordering::Relaxed);
        info!(
            query_id,
            status = %format!("TRANSFORMED_{kind}"),
            before = truncate(before),
            after = truncate(after),
            "query transformed"
        );
    }

    pub fn log_success(
        &self,
        query_id: &str,
        sql: &str,
        elapsed_ms: f64,
        rows: usize,
        was_transformed: bool,
    ) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        let status = if was_transformed {
            "TRANSFORMED_SUCCESS"
        } else {
            "SUCCESS"
        };
        info!(
            query_id,
            status,
            query = truncate(sql),
            elapsed_ms,
            rows,
            "query executed"
        );
    }

    pub fn log_error(&self, query_id: &str, err: &str, sql: &str) {
        error!(
            query_id,
            status = "ERROR",
            error = err,
            query = truncate(sql),
            "query execution failed"
        );
    }

    pub fn snapshot(&self) -> QueryLogSnapshot {
        QueryLogSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            transformed: self.transformed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    pub fn log_metrics(&self) {
        let s = self.snapshot();
        if s.received == 0 {
            return;
        }
        info!(
            total = s.received,
            succeeded = s.succeeded,
            transformed = s.transformed,
            rejected = s.rejected,
            "query metrics"
        );
    }
}

// Long BI-generated statements would otherwise flood the log files.
fn truncate(sql: &str) -> &str {
    match sql.char_indices().nth(500) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counters() {
        let log = QueryLog::new();
        log.log_received("q-1", "conn-1", "127.0.0.1", "SELECT 1");
        log.log_received("q-2", "conn-1", "127.0.0.1", "SELECT 2");
        log.log_success("q-1", "SELECT 1", 0.1, 1, false);
        log.log_rejected("q-2", "write_operation", "INSERT INTO t VALUES (1)");

        let s = log.snapshot();
        assert_eq!(s.received, 2);
        assert_eq!(s.succeeded, 1);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.transformed, 0);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "я".repeat(600);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), 500);
    }
}
