//! listing-harvester - Multi-source listing harvesting pipeline
//!
//! Per-source extractors driven by declarative profiles fetch pages politely,
//! detect blocking, resolve fields with rule chains and normalize prices.
//! Records flow through a router into an upsert store and are read back
//! interleaved across sources.

pub mod commands;
pub mod config;
pub mod filters;
pub mod format;
pub mod interleave;
pub mod narrative;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use config::Config;
pub use pipeline::{ItemRouter, RawRecord, RecordKind};
pub use sources::{SourceExtractor, SourceId, SourceProfile};
pub use store::{MemoryStore, SqliteStore, Store};
