//! listing-harvester - Multi-source listing harvester CLI
//!
//! Harvests collectible and part listings from several storefronts into a
//! local store, then queries them back interleaved across sources.

use anyhow::Result;
use clap::{Parser, Subcommand};
use listing_harvester::commands::list::{LegacyOptions, ListOptions};
use listing_harvester::commands::stories::StoriesOptions;
use listing_harvester::commands::{
    HarvestCommand, LegacyCommand, ListCommand, SourcesCommand, StoriesCommand,
};
use listing_harvester::config::{Config, OutputFormat};
use listing_harvester::sources::SourceId;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "listing-harvester",
    version,
    about = "Multi-source listing harvester",
    long_about = "Harvests listings from several storefronts with per-source politeness, \
                  falls back to demo listings when a source blocks, and stores everything \
                  in a local upsert store."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the SQLite store
    #[arg(long, global = true, env = "HARVEST_STORE")]
    store: Option<PathBuf>,

    /// Output format (table, json, markdown, csv)
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "HARVEST_PROXY")]
    proxy: Option<String>,

    /// Seed for header selection and interleaving
    #[arg(long, global = true, env = "HARVEST_SEED")]
    seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest listings from the configured sources
    #[command(alias = "h")]
    Harvest {
        /// Sources to harvest (defaults to all enabled)
        #[arg(short, long = "source")]
        sources: Vec<SourceId>,

        /// Skip narrative story pages
        #[arg(long)]
        no_narratives: bool,
    },

    /// List stored listings interleaved across sources
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        era: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        team: Option<String>,

        #[arg(long)]
        source: Option<SourceId>,

        /// Vehicle series (parts sources); stored in the same field as era
        #[arg(long, conflicts_with = "era")]
        series: Option<String>,

        /// Minimum price filter
        #[arg(long)]
        min_price: Option<f64>,

        /// Maximum price filter
        #[arg(long)]
        max_price: Option<f64>,

        /// Required keywords in title (comma-separated)
        #[arg(long, value_delimiter = ',')]
        keywords: Option<Vec<String>>,

        /// Excluded keywords from title (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep recency order instead of interleaving sources
        #[arg(long)]
        no_shuffle: bool,
    },

    /// List legacy listings
    Legacy {
        #[arg(long)]
        series: Option<String>,

        #[arg(long)]
        source: Option<SourceId>,

        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List narrative stories by importance
    Stories {
        #[arg(long)]
        era: Option<String>,

        #[arg(long)]
        team: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List known sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(store) = cli.store {
        config.store_dir = Some(store);
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }

    let output = match cli.command {
        Commands::Harvest { sources, no_narratives } => {
            HarvestCommand::new(config).execute(&sources, !no_narratives).await?
        }

        Commands::List {
            era,
            category,
            team,
            source,
            series,
            min_price,
            max_price,
            keywords,
            exclude,
            offset,
            limit,
            no_shuffle,
        } => {
            let options = ListOptions {
                era,
                category,
                team,
                source,
                series,
                min_price,
                max_price,
                keywords: keywords.unwrap_or_default(),
                exclude: exclude.unwrap_or_default(),
                offset,
                limit,
                no_shuffle,
            };
            ListCommand::new(config).execute(&options).await?
        }

        Commands::Legacy { series, source, offset, limit } => {
            let options = LegacyOptions { series, source, offset, limit };
            LegacyCommand::new(config).execute(&options).await?
        }

        Commands::Stories { era, team, limit } => {
            let options = StoriesOptions { era, team, limit };
            StoriesCommand::new(config).execute(&options).await?
        }

        Commands::Sources => SourcesCommand::new(config).execute(),
    };

    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_era_and_series_conflict() {
        let result = Cli::try_parse_from(["listing-harvester", "list", "--era", "United", "--series", "E28"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["listing-harvester", "list", "--series", "E28"]).unwrap();
        assert!(matches!(cli.command, Commands::List { series: Some(_), era: None, .. }));
    }
}
