//! Sources command: prints the source catalog.

use crate::config::Config;
use crate::format::Formatter;
use crate::sources::SourceId;
use serde::Serialize;

/// One catalog entry as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub id: &'static str,
    pub label: String,
    pub kind: String,
    pub currency: &'static str,
    pub targets: usize,
    pub base_url: String,
    pub enabled: bool,
}

/// Lists known sources with their effective configuration.
pub struct SourcesCommand {
    config: Config,
}

impl SourcesCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn sources(&self) -> Vec<SourceInfo> {
        SourceId::all()
            .iter()
            .map(|id| {
                let profile = self.config.profile(*id);
                SourceInfo {
                    id: id.id(),
                    label: id.label().to_string(),
                    kind: profile.record_kind.to_string(),
                    currency: profile.currency,
                    targets: profile.targets.len(),
                    base_url: profile.base_url,
                    enabled: self.config.enabled_sources.contains(id),
                }
            })
            .collect()
    }

    pub fn execute(&self) -> String {
        Formatter::new(self.config.format).format_sources(&self.sources())
    }
}
