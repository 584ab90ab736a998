pub mod analyzer;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod format;
pub mod gate;
pub mod normalize;
pub mod pipeline;
pub mod transform;
pub mod validate;

pub use analyzer::QueryKind;
pub use envelope::QueryEnvelope;
pub use error::PipelineError;
pub use executor::{BackendColumn, BackendError, BackendErrorKind, BackendExecutor, ExecOutput};
pub use normalize::{wire_tag, CellValue, WireTag};
pub use pipeline::{CoreContext, PipelineResult, QueryFailure, QueryPipeline, QueryReply};
