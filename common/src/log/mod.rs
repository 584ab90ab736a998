pub mod query_log;
pub mod tracing_factory;
