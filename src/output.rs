//! JSON output for the CLI.
//!
//! Results are written to stdout, or to a file whose parent directories are
//! created on demand.

use mawaqit_scrape::{ExtractionFailure, PrayerSchedule};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Failure as reported in JSON output.
#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&ExtractionFailure> for FailureReport {
    fn from(e: &ExtractionFailure) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

/// Result of resolving one slug in a batch.
#[derive(Debug, Serialize)]
pub struct SlugOutcome {
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<PrayerSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
}

impl SlugOutcome {
    pub fn new(slug: String, result: Result<PrayerSchedule, ExtractionFailure>) -> Self {
        match result {
            Ok(schedule) => Self {
                slug,
                schedule: Some(schedule),
                error: None,
            },
            Err(e) => Self {
                slug,
                schedule: None,
                error: Some(FailureReport::from(&e)),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

/// Serialize `value` and write it to `output`, or stdout when `None`.
#[instrument(level = "info", skip_all, fields(output = ?output))]
pub async fn write_json<T: Serialize>(
    value: &T,
    output: Option<&str>,
    pretty: bool,
) -> Result<(), Box<dyn Error>> {
    let json = to_json(value, pretty)?;

    let Some(path) = output else {
        println!("{json}");
        return Ok(());
    };

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }
    fs::write(path, json).await?;
    info!(%path, "Wrote JSON output");
    Ok(())
}
