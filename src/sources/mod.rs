//! Source catalog and the generic extraction machinery.

pub mod blocking;
pub mod catalog;
pub mod client;
pub mod extractor;
pub mod fallback;
pub mod heuristics;
pub mod price;
pub mod rules;

pub use catalog::{QueryContext, SourceId, SourceProfile, Target};
pub use client::{HttpFetcher, PageFetcher};
pub use extractor::{HarvestReport, RecordSink, SourceExtractor};
