//! Validation and routing of extracted records into the store.

pub mod record;
pub mod router;

pub use record::{RawRecord, RecordKind};
pub use router::{ItemPipeline, ItemRouter, PipelineContext, PipelineStats, RouteError};
