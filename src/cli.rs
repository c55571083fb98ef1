//! Command-line interface definitions for Mawaqit Scrape.
//!
//! Connection settings can come from a YAML config file, environment
//! variables or flags; flags and env vars override the file.

use clap::{Parser, Subcommand};
use mawaqit_scrape::{ConfigError, ResolverConfig};

/// Command-line arguments for the Mawaqit Scrape application.
///
/// # Examples
///
/// ```sh
/// # Schedule for one mosque
/// mawaqit_scrape slug grande-mosquee-de-paris
///
/// # Several mosques at once, pretty-printed to a file
/// mawaqit_scrape --pretty -o out/schedules.json slug mosque-a mosque-b
///
/// # Mosques listed for Tunisia whose name or city mentions Bizerte
/// mawaqit_scrape country TN --filter bizerte
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "MAWAQIT_CONFIG")]
    pub config: Option<String>,

    /// Site root URL
    #[arg(long, env = "MAWAQIT_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory API version segment
    #[arg(long, env = "MAWAQIT_API_VERSION")]
    pub api_version: Option<String>,

    /// Locale segment of mosque page URLs
    #[arg(long, env = "MAWAQIT_LOCALE")]
    pub locale: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Transport-level retries for network errors and 5xx responses
    #[arg(long)]
    pub retries: Option<usize>,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Resolve schedules by page slug
    Slug {
        #[arg(required = true)]
        slugs: Vec<String>,

        /// Maximum schedules fetched at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Resolve a schedule through a directory search
    Query { query: String },

    /// List mosques for an ISO 3166-1 alpha-2 country code
    Country {
        country_code: String,

        /// Keep only mosques whose name, city or slug contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Free-text directory search
    Search { query: String },

    /// Extract a schedule from a saved mosque page
    File { path: String },
}

impl Cli {
    /// Config file (or defaults) with flag/env overrides applied.
    pub fn resolver_config(&self) -> Result<ResolverConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::from_yaml_file(path)?,
            None => ResolverConfig::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(api_version) = &self.api_version {
            config.api_version = api_version.clone();
        }
        if let Some(locale) = &self.locale {
            config.locale = locale.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }
}
