//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::narrative::{self, NarrativeTarget};
use crate::sources::{SourceId, SourceProfile};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Directory holding the SQLite database
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Seed for header selection and interleaving
    #[serde(default)]
    pub seed: Option<u64>,

    /// Narrative enrichment endpoint; enrichment is off when unset
    #[serde(default)]
    pub enrichment_url: Option<String>,

    /// Sources run by `harvest` when none are named
    #[serde(default = "default_enabled_sources")]
    pub enabled_sources: Vec<SourceId>,

    /// Per-source overrides keyed by source id (e.g. `[sources.ebay]`)
    #[serde(default)]
    pub sources: BTreeMap<String, SourceOverrides>,

    /// Pages mined for narrative stories
    #[serde(default = "narrative::default_targets")]
    pub narrative_targets: Vec<NarrativeTarget>,
}

/// Tunables for one source. Unset fields keep the catalog value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOverrides {
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub delay_jitter_ms: Option<u64>,
    #[serde(default)]
    pub max_in_flight: Option<usize>,
    #[serde(default)]
    pub retry_times: Option<u32>,
    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,
    /// Multiplier from the source currency into USD
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_enabled_sources() -> Vec<SourceId> {
    SourceId::all().to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            store_dir: None,
            format: OutputFormat::Table,
            seed: None,
            enrichment_url: None,
            enabled_sources: default_enabled_sources(),
            sources: BTreeMap::new(),
            narrative_targets: narrative::default_targets(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warns about override sections naming no known source and rejects
    /// conversion rates that would zero out every price.
    pub fn validate(&self) -> Result<()> {
        for key in self.unknown_sources() {
            warn!(
                "Ignoring [sources.{}]: not a source id (known: {})",
                key,
                SourceId::all().iter().map(|id| id.id()).collect::<Vec<_>>().join(", ")
            );
        }

        for (key, overrides) in &self.sources {
            if let Some(rate) = overrides.conversion_rate {
                if !rate.is_finite() || rate <= 0.0 {
                    bail!("[sources.{}] conversion_rate must be a positive number, got {}", key, rate);
                }
            }
        }

        Ok(())
    }

    /// Override keys that match no source id.
    pub fn unknown_sources(&self) -> Vec<&str> {
        self.sources
            .keys()
            .map(String::as_str)
            .filter(|key| !SourceId::all().iter().any(|id| id.id() == *key))
            .collect()
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("harvester.toml");
        if local_config.exists() {
            debug!("Found harvester.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("listing-harvester").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(proxy) = std::env::var("HARVEST_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(dir) = std::env::var("HARVEST_STORE") {
            self.store_dir = Some(PathBuf::from(dir));
        }

        if let Ok(seed) = std::env::var("HARVEST_SEED") {
            if let Ok(s) = seed.parse() {
                self.seed = Some(s);
            }
        }

        if let Ok(url) = std::env::var("HARVEST_ENRICH_URL") {
            self.enrichment_url = Some(url);
        }

        self
    }

    /// Directory for the SQLite store: configured dir, then the platform data
    /// dir, then `./.listing-harvester`.
    pub fn store_path(&self) -> PathBuf {
        self.store_dir
            .clone()
            .or_else(crate::store::SqliteStore::default_dir)
            .unwrap_or_else(|| PathBuf::from(".listing-harvester"))
    }

    /// Catalog profile for a source with configured overrides applied.
    pub fn profile(&self, id: SourceId) -> SourceProfile {
        let mut profile = id.profile();
        let Some(overrides) = self.sources.get(id.id()) else {
            return profile;
        };

        let politeness = &mut profile.politeness;
        if let Some(delay) = overrides.delay_ms {
            politeness.delay_ms = delay;
        }
        if let Some(jitter) = overrides.delay_jitter_ms {
            politeness.delay_jitter_ms = jitter;
        }
        if let Some(max) = overrides.max_in_flight {
            politeness.max_in_flight = max.max(1);
        }
        if let Some(times) = overrides.retry_times {
            politeness.retry.retry_times = times;
        }
        if let Some(backoff) = overrides.retry_backoff_ms {
            politeness.retry.backoff_ms = backoff;
        }
        if let Some(rate) = overrides.conversion_rate {
            profile.usd_rate = Some(rate);
        }
        if let Some(pages) = overrides.max_pages {
            profile.max_pages = pages.max(1);
        }

        profile
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::StoryType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.enabled_sources, SourceId::all().to_vec());
        assert_eq!(config.narrative_targets.len(), 6);
        assert!(config.proxy.is_none());
        assert!(config.seed.is_none());
        assert!(config.enrichment_url.is_none());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);

        let err = "invalid".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("Unknown format"));
        assert!(err.contains("table, json, markdown, csv"));
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn test_output_format_serde() {
        let json = serde_json::to_string(&OutputFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");

        let parsed: OutputFormat = serde_json::from_str("\"markdown\"").unwrap();
        assert_eq!(parsed, OutputFormat::Markdown);
    }

    #[test]
    fn test_config_from_toml_all_fields() {
        let toml = r#"
            proxy = "socks5://localhost:1080"
            timeout_secs = 45
            connect_timeout_secs = 5
            store_dir = "/tmp/harvest"
            format = "json"
            seed = 42
            enrichment_url = "http://localhost:9000/enrich"
            enabled_sources = ["schmiedmann", "eBay"]

            [sources.schmiedmann]
            delay_ms = 100
            conversion_rate = 1.1
            max_pages = 3

            [[narrative_targets]]
            url = "https://example.test/stories"
            story_type = "milestone"
            era = "Madrid"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.proxy.as_deref(), Some("socks5://localhost:1080"));
        assert_eq!(config.timeout_secs, 45);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/harvest")));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.enrichment_url.as_deref(), Some("http://localhost:9000/enrich"));
        assert_eq!(config.enabled_sources, vec![SourceId::Schmiedmann, SourceId::Ebay]);
        assert_eq!(config.sources["schmiedmann"].delay_ms, Some(100));
        assert_eq!(config.narrative_targets.len(), 1);
        assert_eq!(config.narrative_targets[0].story_type, StoryType::Milestone);
        assert_eq!(config.narrative_targets[0].era.as_deref(), Some("Madrid"));
    }

    #[test]
    fn test_profile_overrides() {
        let toml = r#"
            [sources.schmiedmann]
            delay_ms = 100
            delay_jitter_ms = 0
            max_in_flight = 0
            retry_times = 5
            retry_backoff_ms = 10
            conversion_rate = 1.1
            max_pages = 3
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        let profile = config.profile(SourceId::Schmiedmann);
        assert_eq!(profile.politeness.delay_ms, 100);
        assert_eq!(profile.politeness.delay_jitter_ms, 0);
        assert_eq!(profile.politeness.max_in_flight, 1);
        assert_eq!(profile.politeness.retry.retry_times, 5);
        assert_eq!(profile.politeness.retry.backoff_ms, 10);
        assert_eq!(profile.usd_rate, Some(1.1));
        assert_eq!(profile.max_pages, 3);

        let untouched = config.profile(SourceId::Ebay);
        assert_eq!(untouched.politeness, SourceId::Ebay.profile().politeness);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            seed = 9
            format = "csv"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.format, OutputFormat::Csv);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_from_file_not_found() {
        let result = Config::from_file("/nonexistent/path/config.toml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_config_from_file_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_unknown_source_section_is_reported() {
        let toml = r#"
            [sources.schmiedmann]
            delay_ms = 100

            [sources.ebya]
            delay_ms = 5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.unknown_sources(), vec!["ebya"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_override_field_is_rejected() {
        let toml = r#"
            [sources.schmiedmann]
            conversion_rte = 1.1
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_invalid_conversion_rate_is_rejected() {
        for rate in ["0.0", "-1.08", "nan", "inf"] {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "[sources.schmiedmann]\nconversion_rate = {}", rate).unwrap();

            let err = Config::from_file(file.path()).unwrap_err();
            assert!(format!("{:#}", err).contains("conversion_rate must be a positive number"), "{}", rate);
        }
    }

    #[test]
    fn test_config_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "enabled_sources = [\"rockauto\"]").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.enabled_sources, vec![SourceId::RockAuto]);
    }

    #[test]
    fn test_store_path() {
        let config = Config { store_dir: Some(PathBuf::from("/data/x")), ..Config::default() };
        assert_eq!(config.store_path(), PathBuf::from("/data/x"));
    }

    #[test]
    fn test_config_with_env() {
        // Save original env vars
        let keys = ["HARVEST_PROXY", "HARVEST_STORE", "HARVEST_SEED", "HARVEST_ENRICH_URL"];
        let originals: Vec<Option<String>> = keys.iter().map(|k| std::env::var(k).ok()).collect();

        std::env::set_var("HARVEST_PROXY", "http://proxy:8080");
        std::env::set_var("HARVEST_STORE", "/tmp/harvest-env");
        std::env::set_var("HARVEST_SEED", "77");
        std::env::set_var("HARVEST_ENRICH_URL", "http://enrich.test");

        let config = Config::new().with_env();
        assert_eq!(config.proxy, Some("http://proxy:8080".to_string()));
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/harvest-env")));
        assert_eq!(config.seed, Some(77));
        assert_eq!(config.enrichment_url, Some("http://enrich.test".to_string()));

        // Restore original env vars
        for (key, original) in keys.iter().zip(originals) {
            match original {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
