//! CLI command implementations.

pub mod harvest;
pub mod list;
pub mod sources;
pub mod stories;

pub use harvest::HarvestCommand;
pub use list::{LegacyCommand, ListCommand};
pub use sources::SourcesCommand;
pub use stories::StoriesCommand;
