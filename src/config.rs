//! Resolver configuration.
//!
//! All knobs the pipeline needs (site base URL, API version, page locale,
//! outbound identification header, timeout) live in [`ResolverConfig`], which
//! is passed explicitly to [`Resolver::new`](crate::resolver::Resolver::new).
//! Several resolvers with different configurations can coexist, e.g. one
//! pointed at a test double.
//!
//! A config can be loaded from YAML; missing keys fall back to the defaults:
//!
//! ```yaml
//! base_url: https://mawaqit.net
//! api_version: "2.0"
//! locale: fr
//! timeout_secs: 20
//! extra_patterns:
//!   - 'var\s+confData\s*=\s*(\{[\s\S]*?\})\s*</script>'
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://mawaqit.net";
/// Last directory API version observed to work. 3.0 has been probed but
/// never confirmed, so it is not the default.
pub const DEFAULT_API_VERSION: &str = "2.0";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_VARIABLE_NAME: &str = "confData";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Site root, without trailing path.
    pub base_url: String,
    /// Directory API version segment, e.g. `2.0` in `/api/2.0/mosque/...`.
    pub api_version: String,
    /// Locale segment of mosque page URLs.
    pub locale: String,
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Transport-level retries for retryable failures. The resolver itself
    /// never retries.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Name of the script variable holding the embedded payload.
    pub variable_name: String,
    /// Extra regexes (one capture group around the object literal) tried
    /// after the built-in patterns, in order.
    pub extra_patterns: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 0,
            retry_base_delay_ms: 500,
            variable_name: DEFAULT_VARIABLE_NAME.to_string(),
            extra_patterns: Vec::new(),
        }
    }
}

impl ResolverConfig {
    /// Load a config from a YAML file and validate it.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&raw)?;
        info!(base_url = %config.base_url, api_version = %config.api_version, "Loaded resolver config");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ResolverConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the base URL parses. Patterns are checked when the
    /// [`PatternSet`](crate::extract::PatternSet) is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    fn base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `{base}/{locale}/{slug}`
    pub fn page_url(&self, slug: &str) -> String {
        format!(
            "{}/{}/{}",
            self.root(),
            self.locale,
            urlencoding::encode(slug)
        )
    }

    /// `{base}/api/{version}/mosque/map/{country}`
    pub fn country_url(&self, country_code: &str) -> String {
        format!(
            "{}/api/{}/mosque/map/{}",
            self.root(),
            self.api_version,
            urlencoding::encode(country_code)
        )
    }

    /// `{base}/api/{version}/mosque/search?q={query}`
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/api/{}/mosque/search?q={}",
            self.root(),
            self.api_version,
            urlencoding::encode(query)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.api_version, "2.0");
        assert_eq!(config.variable_name, "confData");
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_urls() {
        let config = ResolverConfig {
            base_url: "https://mawaqit.net/".to_string(),
            ..ResolverConfig::default()
        };
        assert_eq!(
            config.page_url("grande-mosquee-de-paris"),
            "https://mawaqit.net/en/grande-mosquee-de-paris"
        );
        assert_eq!(
            config.country_url("FR"),
            "https://mawaqit.net/api/2.0/mosque/map/FR"
        );
        assert_eq!(
            config.search_url("saint denis"),
            "https://mawaqit.net/api/2.0/mosque/search?q=saint%20denis"
        );
    }

    #[test]
    fn test_yaml_partial_overrides() {
        let config = ResolverConfig::from_yaml_str("api_version: \"3.0\"\nlocale: fr\n").unwrap();
        assert_eq!(config.api_version, "3.0");
        assert_eq!(config.locale, "fr");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_yaml_rejects_bad_base_url() {
        let err = ResolverConfig::from_yaml_str("base_url: not a url\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }
}
