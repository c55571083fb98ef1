//! # Mawaqit Scrape
//!
//! Extracts a mosque's prayer schedule from mawaqit.net, which publishes no
//! stable API: the schedule is a JavaScript object literal inlined into a
//! server-rendered page, and the mosque directory is an undocumented,
//! loosely typed JSON endpoint.
//!
//! ## Architecture
//!
//! The [`Resolver`] runs a single-request pipeline:
//! 1. **Identity**: look a query up in the directory ([`directory`])
//! 2. **Fetch**: GET the mosque page ([`transport`])
//! 3. **Locate**: enumerate inline script bodies ([`scripts`])
//! 4. **Extract**: isolate the payload with ordered patterns ([`extract`])
//! 5. **Parse**: decode the payload ([`payload`])
//! 6. **Normalize**: validate into a [`PrayerSchedule`] ([`normalize`])
//!
//! Each stage fails with a typed [`ExtractionFailure`] telling a changed page
//! apart from a missing mosque or a network problem.
//!
//! ## Usage
//!
//! ```no_run
//! use mawaqit_scrape::{Resolver, ResolverConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::new(ResolverConfig::default())?;
//! let schedule = resolver.resolve_by_slug("grande-mosquee-de-paris").await?;
//! println!("{} fajr at {}", schedule.mosque_name, schedule.fajr());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod payload;
pub mod resolver;
pub mod scripts;
pub mod transport;
pub mod utils;

pub use config::ResolverConfig;
pub use error::{ConfigError, ExtractionFailure, FailureKind, TransportError};
pub use models::{MosqueSummary, Prayer, PrayerSchedule};
pub use resolver::Resolver;
pub use transport::{FetchResponse, HttpTransport, RetryTransport, Transport};
