//! # Mawaqit Scrape CLI
//!
//! Resolves mosque prayer schedules from mawaqit.net and prints them as JSON.
//!
//! ## Usage
//!
//! ```sh
//! mawaqit_scrape slug grande-mosquee-de-paris
//! mawaqit_scrape --pretty country FR --filter lyon
//! RUST_LOG=mawaqit_scrape=debug mawaqit_scrape query jamii-lqsiba-benzrt-7000-tunisia
//! ```

use clap::Parser;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use mawaqit_scrape::Resolver;
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod output;

use cli::{Cli, Command};
use output::{SlugOutcome, write_json};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    // Logs go to stderr so stdout stays valid JSON.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    let config = args.resolver_config()?;
    info!(base_url = %config.base_url, api_version = %config.api_version, "mawaqit_scrape starting up");
    let resolver = Resolver::new(config)?;
    let output = args.output.as_deref();

    match args.command {
        Command::Slug { slugs, concurrency } => {
            let slugs: Vec<String> = slugs.into_iter().unique().collect();
            let total = slugs.len();

            let outcomes: Vec<SlugOutcome> = stream::iter(slugs)
                .map(|slug| {
                    let resolver = &resolver;
                    async move {
                        let result = resolver.resolve_by_slug(&slug).await;
                        SlugOutcome::new(slug, result)
                    }
                })
                .buffered(concurrency.max(1))
                .collect()
                .await;

            let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
            info!(total, failed, "Resolved schedules");

            if total == 1 {
                let outcome = outcomes.into_iter().next();
                match outcome {
                    Some(SlugOutcome {
                        schedule: Some(schedule),
                        ..
                    }) => write_json(&schedule, output, args.pretty).await?,
                    Some(outcome) => {
                        write_json(&outcome, output, args.pretty).await?;
                        return Err(format!("failed to resolve {}", outcome.slug).into());
                    }
                    None => {}
                }
            } else {
                write_json(&outcomes, output, args.pretty).await?;
                if failed == total {
                    return Err("every slug failed to resolve".into());
                }
            }
        }
        Command::Query { query } => {
            let schedule = resolver.resolve_by_query(&query).await?;
            write_json(&schedule, output, args.pretty).await?;
        }
        Command::Country {
            country_code,
            filter,
        } => {
            let mut mosques = resolver.list_by_country(&country_code).await?;
            if let Some(needle) = filter.as_deref() {
                let before = mosques.len();
                mosques.retain(|m| m.matches(needle));
                info!(before, after = mosques.len(), %needle, "Filtered country listing");
            }
            if mosques.is_empty() {
                warn!(%country_code, "No mosques listed");
            }
            write_json(&mosques, output, args.pretty).await?;
        }
        Command::Search { query } => {
            let mosques = resolver.search(&query).await?;
            write_json(&mosques, output, args.pretty).await?;
        }
        Command::File { path } => {
            let html = tokio::fs::read_to_string(&path).await?;
            let schedule = resolver.extract_schedule(&html)?;
            write_json(&schedule, output, args.pretty).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, millis = elapsed.as_millis() as u64, "Execution complete");
    Ok(())
}
