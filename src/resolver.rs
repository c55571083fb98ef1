//! The resolve pipeline.
//!
//! A call moves `Idle -> Resolving -> {Succeeded, Failed}`. Resolving runs
//! these stages in order, any of which can end the call:
//!
//! ```text
//! resolve_identity -> fetch_page -> locate_scripts -> extract_payload
//!                  -> parse_payload -> normalize_schedule
//! ```
//!
//! `resolve_identity` only runs when resolving by query. Nothing is retried
//! here: retry, if configured, happens inside the transport and a transport
//! failure that reaches the resolver is final for that call.
//!
//! A [`Resolver`] holds no mutable state, so one instance can serve many
//! concurrent calls. Dropping a call's future cancels it between stages.

use crate::config::ResolverConfig;
use crate::directory::DirectoryClient;
use crate::error::{ConfigError, ExtractionFailure, Result, TransportError};
use crate::extract::PatternSet;
use crate::models::{MosqueSummary, PrayerSchedule};
use crate::transport::{HttpTransport, RetryTransport, Transport};
use crate::{normalize, payload, scripts};
use itertools::Itertools;
use scraper::Html;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Transport used by [`Resolver::new`].
pub type DefaultTransport = RetryTransport<HttpTransport>;

/// A step of the resolve pipeline, recorded in logs when a call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveIdentity,
    FetchPage,
    LocateScripts,
    ExtractPayload,
    ParsePayload,
    NormalizeSchedule,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ResolveIdentity => "resolve_identity",
            Stage::FetchPage => "fetch_page",
            Stage::LocateScripts => "locate_scripts",
            Stage::ExtractPayload => "extract_payload",
            Stage::ParsePayload => "parse_payload",
            Stage::NormalizeSchedule => "normalize_schedule",
        };
        f.write_str(s)
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "Entering stage");
}

/// Log a terminal failure with the stage it happened in.
fn check<T>(stage: Stage, result: Result<T>) -> Result<T> {
    result.inspect_err(|e| warn!(%stage, kind = %e.kind(), error = %e, "Resolve failed"))
}

/// Resolves mosques to normalized prayer schedules.
pub struct Resolver<T = DefaultTransport> {
    config: ResolverConfig,
    patterns: PatternSet,
    transport: T,
}

impl Resolver<DefaultTransport> {
    /// Resolver over HTTP, retrying per `config.max_retries`.
    pub fn new(config: ResolverConfig) -> std::result::Result<Self, ConfigError> {
        let http = HttpTransport::new(&config)?;
        let transport = RetryTransport::new(http, config.max_retries, config.retry_base_delay());
        Self::with_transport(config, transport)
    }
}

impl<T> Resolver<T>
where
    T: Transport,
{
    /// Resolver over any transport, e.g. a test double.
    pub fn with_transport(
        config: ResolverConfig,
        transport: T,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let patterns = PatternSet::with_extras(&config.variable_name, &config.extra_patterns)?;
        debug!(patterns = %patterns.names().join(","), "Resolver ready");
        Ok(Self {
            config,
            patterns,
            transport,
        })
    }

    /// The configuration this resolver was built with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn directory(&self) -> DirectoryClient<'_, T> {
        DirectoryClient::new(&self.config, &self.transport)
    }

    /// Fetch and normalize the schedule on a mosque's page.
    ///
    /// # Arguments
    ///
    /// * `slug` - URL-path component of the mosque page, surrounding
    ///   whitespace ignored
    ///
    /// # Returns
    ///
    /// The normalized schedule, or:
    /// - [`ExtractionFailure::NotFound`] for an empty slug or a 404 page
    /// - [`ExtractionFailure::Transport`] for network failures and other
    ///   non-2xx statuses
    /// - [`ExtractionFailure::StructureChanged`],
    ///   [`ExtractionFailure::MalformedPayload`] or
    ///   [`ExtractionFailure::Validation`] from the page content
    #[instrument(level = "info", skip(self))]
    pub async fn resolve_by_slug(&self, slug: &str) -> Result<PrayerSchedule> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(ExtractionFailure::NotFound {
                query: slug.to_string(),
            });
        }
        let html = self.fetch_page(slug).await?;
        let schedule = self.extract_schedule(&html)?;
        info!(mosque = %schedule.mosque_name, "Resolved schedule");
        Ok(schedule)
    }

    /// Search the directory, then resolve the first entry whose slug equals
    /// `query` exactly.
    ///
    /// # Returns
    ///
    /// [`ExtractionFailure::NotFound`] when no listed slug equals `query`; the
    /// page is never fetched in that case. Otherwise as
    /// [`resolve_by_slug`](Self::resolve_by_slug).
    #[instrument(level = "info", skip(self))]
    pub async fn resolve_by_query(&self, query: &str) -> Result<PrayerSchedule> {
        let summary = self.resolve_identity(query).await?;
        self.resolve_by_slug(&summary.slug).await
    }

    /// All mosques the directory lists for a country.
    pub async fn list_by_country(&self, country_code: &str) -> Result<Vec<MosqueSummary>> {
        self.directory().by_country(country_code).await
    }

    /// Free-text directory search.
    pub async fn search(&self, query: &str) -> Result<Vec<MosqueSummary>> {
        self.directory().search(query).await
    }

    async fn resolve_identity(&self, query: &str) -> Result<MosqueSummary> {
        enter(Stage::ResolveIdentity);
        let candidates = check(Stage::ResolveIdentity, self.directory().search(query).await)?;
        debug!(count = candidates.len(), "Directory candidates");
        let found = candidates
            .into_iter()
            .find(|m| m.slug == query)
            .ok_or_else(|| ExtractionFailure::NotFound {
                query: query.to_string(),
            });
        check(Stage::ResolveIdentity, found)
    }

    async fn fetch_page(&self, slug: &str) -> Result<String> {
        enter(Stage::FetchPage);
        let url = self.config.page_url(slug);
        let fetched: Result<_> = self.transport.fetch(&url).await.map_err(Into::into);
        let response = check(Stage::FetchPage, fetched)?;
        let page = match response.status {
            404 => Err(ExtractionFailure::NotFound {
                query: slug.to_string(),
            }),
            _ if response.is_success() => {
                debug!(bytes = response.body.len(), "Got page content");
                Ok(response.body)
            }
            status => Err(TransportError::Status { url, status }.into()),
        };
        check(Stage::FetchPage, page)
    }

    /// Run the synchronous stages over a page body: locate scripts, extract,
    /// parse and normalize.
    ///
    /// Useful for pages saved to disk. No request is made.
    ///
    /// # Example
    ///
    /// ```
    /// use mawaqit_scrape::{Resolver, ResolverConfig};
    ///
    /// let resolver = Resolver::new(ResolverConfig::default()).unwrap();
    /// let html = r#"<script>let confData = {"name": "A", "timezone": "UTC",
    ///     "times": ["05:00", "06:30", "12:15", "15:45", "18:20", "19:50"]};</script>"#;
    /// let schedule = resolver.extract_schedule(html).unwrap();
    /// assert_eq!(schedule.fajr(), "05:00");
    /// ```
    pub fn extract_schedule(&self, html: &str) -> Result<PrayerSchedule> {
        enter(Stage::LocateScripts);
        let document = Html::parse_document(html);

        enter(Stage::ExtractPayload);
        let extracted = self
            .patterns
            .extract(scripts::locate(&document))
            .ok_or_else(|| {
                ExtractionFailure::structure_changed(format!(
                    "no `{}` declaration matched patterns [{}] in any inline script",
                    self.config.variable_name,
                    self.patterns.names().join(", ")
                ))
            });
        let extracted = check(Stage::ExtractPayload, extracted)?;
        debug!(
            source_index = extracted.source_index,
            pattern = %extracted.pattern,
            "Extracted payload"
        );

        enter(Stage::ParsePayload);
        let value = check(Stage::ParsePayload, payload::parse(&extracted.span))?;

        enter(Stage::NormalizeSchedule);
        check(Stage::NormalizeSchedule, normalize::normalize(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::transport::testing::StaticTransport;

    const BASE: &str = "https://mawaqit.test";
    const PAGE_URL: &str = "https://mawaqit.test/en/test-mosque";

    const TEST_PAGE: &str = r#"<html><head><title>Test</title></head><body>
<script>let confData = {"name":"Test Mosque","times":["05:00","06:30","12:15","15:45","18:20","19:50"],"timezone":"Europe/Paris"}; </script>
</body></html>"#;

    fn config() -> ResolverConfig {
        ResolverConfig {
            base_url: BASE.to_string(),
            ..ResolverConfig::default()
        }
    }

    fn resolver(transport: StaticTransport) -> Resolver<StaticTransport> {
        Resolver::with_transport(config(), transport).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_by_slug_end_to_end() {
        let r = resolver(StaticTransport::new().with(PAGE_URL, 200, TEST_PAGE));
        let s = r.resolve_by_slug("test-mosque").await.unwrap();
        assert_eq!(s.mosque_name, "Test Mosque");
        assert_eq!(
            s.daily_times,
            ["05:00", "06:30", "12:15", "15:45", "18:20", "19:50"]
        );
        assert_eq!(s.shuruq, "06:30");
        assert_eq!(s.jumua, None);
        assert!(s.iqama_calendar.is_empty());
        assert_eq!(s.timezone, "Europe/Paris");
    }

    #[tokio::test]
    async fn test_payload_in_later_script() {
        let page = r#"<html><head>
<script src="/app.js"></script>
<script>window.dataLayer = [];</script>
</head><body>
<script>
    var lang = "en";
    let confData = {
        "name": "Mosquée Al-Fath",
        "label": "Centre",
        "times": ["06:01", "07:40", "12:50", "15:10", "17:55", "19:20"],
        "shuruq": "07:40",
        "jumua": "13:15",
        "timezone": "Africa/Tunis",
        "latitude": 37.27,
        "longitude": "9.87",
        "iqamaCalendar": [{"1": ["+15", "+0", "+10", "+10", "+5", "+10"]}]
    };
</script>
</body></html>"#;
        let r = resolver(StaticTransport::new().with(PAGE_URL, 200, page));
        let s = r.resolve_by_slug("test-mosque").await.unwrap();
        assert_eq!(s.mosque_name, "Mosquée Al-Fath");
        assert_eq!(s.jumua.as_deref(), Some("13:15"));
        assert_eq!(s.longitude, Some(9.87));
        assert_eq!(s.iqama_on(1, 1).map(<[String]>::len), Some(6));
    }

    #[tokio::test]
    async fn test_structure_changed() {
        let page = "<html><body><script>var conf = {};</script></body></html>";
        let r = resolver(StaticTransport::new().with(PAGE_URL, 200, page));
        let err = r.resolve_by_slug("test-mosque").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::StructureChanged);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let page = "<script>let confData = {\"name\": \"A\", \"times\": [05:00]};</script>";
        let r = resolver(StaticTransport::new().with(PAGE_URL, 200, page));
        let err = r.resolve_by_slug("test-mosque").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedPayload);
    }

    #[tokio::test]
    async fn test_validation_failure_names_field() {
        let page = r#"<script>let confData = {"name":"A","times":["05:00","12:15","15:45","18:20","19:50"],"timezone":"UTC"};</script>"#;
        let r = resolver(StaticTransport::new().with(PAGE_URL, 200, page));
        match r.resolve_by_slug("test-mosque").await.unwrap_err() {
            ExtractionFailure::Validation { field, .. } => assert_eq!(field, "times"),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_page_404_is_not_found() {
        let r = resolver(StaticTransport::new());
        let err = r.resolve_by_slug("nowhere").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_page_server_error_is_transport() {
        let r = resolver(StaticTransport::new().with(PAGE_URL, 503, "down"));
        let err = r.resolve_by_slug("test-mosque").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(err.is_retryable());
        // no retry inside the resolver
        assert_eq!(r.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_transport() {
        let r = resolver(StaticTransport::new().with_error(
            PAGE_URL,
            TransportError::Timeout {
                url: PAGE_URL.to_string(),
            },
        ));
        let err = r.resolve_by_slug("test-mosque").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionFailure::Transport(TransportError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_by_query_exact_slug() {
        let transport = StaticTransport::new()
            .with(
                "https://mawaqit.test/api/2.0/mosque/search?q=test-mosque",
                200,
                r#"[
                    {"slug": "test-mosque-annex", "name": "Annex"},
                    {"name": "no slug"},
                    {"slug": "test-mosque", "name": "Test Mosque"}
                ]"#,
            )
            .with(PAGE_URL, 200, TEST_PAGE);
        let r = resolver(transport);
        let s = r.resolve_by_query("test-mosque").await.unwrap();
        assert_eq!(s.mosque_name, "Test Mosque");
        assert_eq!(
            r.transport.requests.borrow().last().map(String::as_str),
            Some(PAGE_URL)
        );
    }

    #[tokio::test]
    async fn test_resolve_by_query_without_exact_match() {
        let transport = StaticTransport::new().with(
            "https://mawaqit.test/api/2.0/mosque/search?q=paris",
            200,
            r#"[{"slug": "grande-mosquee-de-paris", "name": "Grande Mosquée"}]"#,
        );
        let r = resolver(transport);
        let err = r.resolve_by_query("paris").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
        // page is never fetched
        assert_eq!(r.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_by_country() {
        let transport = StaticTransport::new().with(
            "https://mawaqit.test/api/2.0/mosque/map/FR",
            200,
            r#"[{"slug": "a", "name": "A"}, {"name": "B"}, {"slug": "c", "name": "C"}]"#,
        );
        let r = resolver(transport);
        let mosques = r.list_by_country("FR").await.unwrap();
        assert_eq!(mosques.len(), 2);
    }

    #[tokio::test]
    async fn test_custom_locale_and_variable() {
        let config = ResolverConfig {
            base_url: BASE.to_string(),
            locale: "fr".to_string(),
            variable_name: "mosqueData".to_string(),
            ..ResolverConfig::default()
        };
        let page = TEST_PAGE.replace("confData", "mosqueData");
        let transport =
            StaticTransport::new().with("https://mawaqit.test/fr/test-mosque", 200, &page);
        let r = Resolver::with_transport(config, transport).unwrap();
        assert!(r.resolve_by_slug("test-mosque").await.is_ok());
    }

    #[test]
    fn test_invalid_extra_pattern_rejected() {
        let config = ResolverConfig {
            extra_patterns: vec!["([".to_string()],
            ..config()
        };
        let err = Resolver::with_transport(config, StaticTransport::new()).err();
        assert!(matches!(err, Some(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_default_resolver_builds() {
        assert!(Resolver::new(ResolverConfig::default()).is_ok());
    }
}
