//! Typed failures for the extraction pipeline.
//!
//! Every stage of the pipeline reports one of five failure kinds, each with
//! enough context (field name, byte offset, HTTP status) to log a precise
//! diagnostic from the failure alone.

use thiserror::Error;

/// Discriminant of [`ExtractionFailure`], convenient for matching in callers
/// and for structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    StructureChanged,
    MalformedPayload,
    Transport,
    Validation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::NotFound => "not_found",
            FailureKind::StructureChanged => "structure_changed",
            FailureKind::MalformedPayload => "malformed_payload",
            FailureKind::Transport => "transport",
            FailureKind::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// Outcome of a failed resolve, directory or extraction call.
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    /// The slug or query matched no mosque.
    #[error("no mosque matches {query:?}")]
    NotFound { query: String },

    /// No extraction pattern matched any script body, or a directory
    /// response was not a list of objects.
    #[error("page structure changed: {detail}")]
    StructureChanged { detail: String },

    /// A pattern matched but the isolated text did not decode.
    #[error("malformed payload at byte {offset}: {message} (near {context:?})")]
    MalformedPayload {
        offset: usize,
        message: String,
        context: String,
    },

    /// Fetching failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The decoded payload is missing a required field or has the wrong shape.
    #[error("invalid field `{field}`: {reason}")]
    Validation { field: String, reason: String },
}

impl ExtractionFailure {
    /// The variant as a plain discriminant.
    ///
    /// # Example
    ///
    /// ```
    /// use mawaqit_scrape::{ExtractionFailure, FailureKind};
    ///
    /// let e = ExtractionFailure::NotFound { query: "x".to_string() };
    /// assert_eq!(e.kind(), FailureKind::NotFound);
    /// assert_eq!(e.kind().to_string(), "not_found");
    /// ```
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractionFailure::NotFound { .. } => FailureKind::NotFound,
            ExtractionFailure::StructureChanged { .. } => FailureKind::StructureChanged,
            ExtractionFailure::MalformedPayload { .. } => FailureKind::MalformedPayload,
            ExtractionFailure::Transport(_) => FailureKind::Transport,
            ExtractionFailure::Validation { .. } => FailureKind::Validation,
        }
    }

    /// Only transport failures can succeed on a later attempt; a changed page
    /// or invalid payload needs a code change, not a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractionFailure::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ExtractionFailure::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn structure_changed(detail: impl Into<String>) -> Self {
        ExtractionFailure::StructureChanged {
            detail: detail.into(),
        }
    }
}

/// Failure raised by a [`Transport`](crate::transport::Transport) or by a
/// caller rejecting the status it returned.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or body read failure.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The request did not complete within the configured timeout.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// The HTTP client itself could not be built.
    #[error("HTTP client error: {message}")]
    Client { message: String },
}

impl TransportError {
    /// HTTP status carried by [`TransportError::Status`], `None` for failures
    /// where no response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a later attempt could succeed: network failures, timeouts,
    /// `429` and `5xx`. Client build failures and other statuses are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Network { .. } | TransportError::Timeout { .. } => true,
            TransportError::Client { .. } => false,
        }
    }
}

/// Errors building a [`ResolverConfig`](crate::config::ResolverConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid extraction pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("building HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ExtractionFailure>;
