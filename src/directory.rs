//! Mosque directory endpoints.
//!
//! Two JSON endpoints list mosques:
//! - `GET {base}/api/{version}/mosque/map/{country}`
//! - `GET {base}/api/{version}/mosque/search?q={query}`
//!
//! Both return a loosely typed list of objects. Rows are mapped one by one
//! into [`MosqueSummary`]; a row without a usable `slug` is skipped with a
//! warning and the rest of the listing survives.
//!
//! Field mapping:
//!
//! | Summary | Row keys |
//! |---------|----------|
//! | `id` | `id` (string or number), falls back to `slug` |
//! | `latitude` | `lat` or `latitude`, number or finite numeric string |
//! | `longitude` | `lng`, `lon` or `longitude`, number or finite numeric string |
//! | `country_code` | `countryCode`, else the requested country |

use crate::config::ResolverConfig;
use crate::error::{ExtractionFailure, Result, TransportError};
use crate::models::MosqueSummary;
use crate::transport::Transport;
use crate::utils::truncate_for_log;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// A row dropped from a listing, with its position and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub index: usize,
    pub reason: String,
}

/// Directory client over any [`Transport`].
pub struct DirectoryClient<'a, T> {
    config: &'a ResolverConfig,
    transport: &'a T,
}

impl<'a, T> DirectoryClient<'a, T>
where
    T: Transport,
{
    pub fn new(config: &'a ResolverConfig, transport: &'a T) -> Self {
        Self { config, transport }
    }

    /// All mosques the site lists for a country.
    ///
    /// # Arguments
    ///
    /// * `country_code` - ISO 3166-1 alpha-2 code, e.g. `FR`; also used as
    ///   the summaries' country when a row has none
    ///
    /// # Returns
    ///
    /// Every well-formed row. A non-2xx status is a
    /// [`ExtractionFailure::Transport`], a body that is not a JSON list is
    /// [`ExtractionFailure::StructureChanged`].
    #[instrument(level = "info", skip(self))]
    pub async fn by_country(&self, country_code: &str) -> Result<Vec<MosqueSummary>> {
        let url = self.config.country_url(country_code);
        self.fetch_listing(&url, Some(country_code)).await
    }

    /// Mosques matching a free-text search.
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<MosqueSummary>> {
        let url = self.config.search_url(query);
        self.fetch_listing(&url, None).await
    }

    async fn fetch_listing(
        &self,
        url: &str,
        country_code: Option<&str>,
    ) -> Result<Vec<MosqueSummary>> {
        let response = self.transport.fetch(url).await?;
        if !response.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status,
            }
            .into());
        }

        let (mosques, skipped) = parse_listing(&response.body, country_code)?;
        for row in &skipped {
            warn!(%url, index = row.index, reason = %row.reason, "Skipping malformed directory row");
        }
        info!(
            %url,
            count = mosques.len(),
            skipped = skipped.len(),
            "Fetched directory listing"
        );
        Ok(mosques)
    }
}

/// Decode a directory body into summaries plus the rows that were skipped.
///
/// # Errors
///
/// [`ExtractionFailure::StructureChanged`] when the body is not a JSON list.
pub fn parse_listing(
    body: &str,
    country_code: Option<&str>,
) -> Result<(Vec<MosqueSummary>, Vec<SkippedRow>)> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ExtractionFailure::structure_changed(format!(
            "directory response is not JSON ({e}): {}",
            truncate_for_log(body, 120)
        ))
    })?;
    let rows = match value {
        Value::Array(rows) => rows,
        other => {
            return Err(ExtractionFailure::structure_changed(format!(
                "directory response is not a list: {}",
                truncate_for_log(&other.to_string(), 120)
            )));
        }
    };

    let mut mosques = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match summary_from_row(row, country_code) {
            Ok(summary) => mosques.push(summary),
            Err(reason) => skipped.push(SkippedRow { index, reason }),
        }
    }
    debug!(rows = rows.len(), kept = mosques.len(), "Parsed directory listing");
    Ok((mosques, skipped))
}

fn summary_from_row(
    row: &Value,
    country_code: Option<&str>,
) -> std::result::Result<MosqueSummary, String> {
    let obj = row.as_object().ok_or_else(|| "row is not an object".to_string())?;

    let slug = obj
        .get("slug")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing slug".to_string())?
        .to_string();

    let id = obj
        .get("id")
        .and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| slug.clone());

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let coord = |keys: &[&str]| {
        keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
                .filter(|n| n.is_finite())
        })
    };

    Ok(MosqueSummary {
        id,
        name: text("name").unwrap_or_default(),
        city: text("city"),
        latitude: coord(&["lat", "latitude"]),
        longitude: coord(&["lng", "lon", "longitude"]),
        country_code: text("countryCode").or_else(|| country_code.map(str::to_uppercase)),
        slug,
    })
}
