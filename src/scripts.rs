//! Inline script enumeration.
//!
//! Yields the bodies of every inline `<script>` element (no `src`) in
//! document order. No content filtering happens here; deciding which body
//! holds the payload is the extractor's job.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static INLINE_SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script:not([src])").expect("valid selector"));

/// Lazily enumerate inline script bodies of a parsed document.
///
/// The iterator borrows `document`; calling `locate` again on the same
/// document starts a fresh pass.
pub fn locate(document: &Html) -> impl Iterator<Item = String> + '_ {
    document
        .select(&INLINE_SCRIPT)
        .map(|element| element.text().collect::<String>())
}

/// Parse `html` and collect its inline script bodies.
pub fn script_bodies(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    locate(&document).collect()
}
