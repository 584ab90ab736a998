use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Per-request envelope. Created by the session when a query arrives and
/// carried through the pipeline for log correlation; immutable afterwards.
#[derive(Debug, Clone)]
pub struct QueryEnvelope {
    pub query_id: String,
    pub raw_sql: String,
    pub connection_id: String,
    pub source_address: String,
    pub received_at: DateTime<Utc>,
}

impl QueryEnvelope {
    pub fn new(raw_sql: &str, connection_id: &str, source_address: &str) -> Self {
        QueryEnvelope {
            query_id: Uuid::new_v4().to_string(),
            raw_sql: raw_sql.to_string(),
            connection_id: connection_id.to_string(),
            source_address: source_address.to_string(),
            received_at: Utc::now(),
        }
    }
}
