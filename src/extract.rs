//! Locating the embedded payload inside script bodies.
//!
//! The site inlines its page configuration as
//! `let confData = { ... };` at the end of a script. The formatting around
//! the declaration has drifted over time, so extraction tries an ordered
//! list of named patterns, most specific first:
//!
//! | Pattern | Terminator |
//! |---------|------------|
//! | `end_of_script` | `;` then only spaces/tabs before the script ends |
//! | `newline_then_end` | `;` then a newline, then the script ends |
//! | `bare_semicolon` | first `};` after the declaration, no end anchor |
//!
//! The end anchor, not brace counting, bounds the match: the declaration is
//! always the last statement of its script, and the object literal is
//! multi-line. The two anchored patterns give up on a span holding `};` and a
//! line break, which means they ran on into a later statement.
//! `bare_semicolon` is the fallback because it can stop early at a `};`
//! inside a string.
//!
//! Precedence: script bodies are scanned in document order; within a body
//! the patterns are tried in list order; the first hit wins and nothing
//! after it is inspected.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

/// `};` closing one statement with another line after it. Never valid inside
/// a decoded object literal, since a JSON string cannot hold a raw newline.
static STATEMENT_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\}[ \t]*;[ \t]*\r?\n").expect("valid regex"));

/// A named regex with one capture group around the object literal.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    name: String,
    regex: Regex,
    single_statement: bool,
}

impl ExtractionPattern {
    /// Compile a pattern.
    ///
    /// # Arguments
    ///
    /// * `name` - Label reported in logs and in [`Extracted::pattern`]
    /// * `pattern` - Regex whose first capture group isolates the object literal
    ///
    /// # Returns
    ///
    /// [`ConfigError::InvalidPattern`] when the regex does not compile or has
    /// no capture group.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if regex.captures_len() < 2 {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern needs a capture group around the object literal".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            regex,
            single_statement: false,
        })
    }

    /// Refuse spans that run past the end of the declaring statement.
    ///
    /// Greedy, end-anchored patterns otherwise swallow a following statement
    /// that also ends in `};`.
    pub fn single_statement(mut self) -> Self {
        self.single_statement = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first capture group of the first match in `body`.
    fn find<'a>(&self, body: &'a str) -> Option<&'a str> {
        let span = self
            .regex
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())?;
        if self.single_statement && STATEMENT_BREAK.is_match(span) {
            debug!(pattern = %self.name, "Span crosses a statement boundary");
            return None;
        }
        Some(span)
    }
}

/// Ordered pattern list. Extendable; built-ins always come first.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<ExtractionPattern>,
}

impl PatternSet {
    /// Built-in patterns for a declaration of `variable`.
    ///
    /// `variable` is escaped, so any identifier is matched literally.
    ///
    /// # Example
    ///
    /// ```
    /// use mawaqit_scrape::extract::PatternSet;
    ///
    /// let set = PatternSet::for_variable("confData").unwrap();
    /// let found = set.extract([r#"let confData = {"name": "A"};"#]).unwrap();
    /// assert_eq!(found.span, r#"{"name": "A"}"#);
    /// ```
    pub fn for_variable(variable: &str) -> Result<Self, ConfigError> {
        let decl = format!(
            r"\b(?:let|var|const)\s+{}\s*=\s*",
            regex::escape(variable)
        );
        let patterns = vec![
            ExtractionPattern::new(
                "end_of_script",
                &format!(r"(?s){decl}(\{{.*\}})\s*;[ \t]*\z"),
            )?
            .single_statement(),
            ExtractionPattern::new(
                "newline_then_end",
                &format!(r"(?s){decl}(\{{.*\}})\s*;[ \t]*\r?\n\s*\z"),
            )?
            .single_statement(),
            ExtractionPattern::new("bare_semicolon", &format!(r"(?s){decl}(\{{.*?\}})\s*;"))?,
        ];
        Ok(Self { patterns })
    }

    /// Append a lower-priority pattern.
    pub fn push(&mut self, pattern: ExtractionPattern) {
        self.patterns.push(pattern);
    }

    /// Built-ins for `variable` followed by the given raw patterns.
    ///
    /// # Arguments
    ///
    /// * `variable` - Name of the declared script variable
    /// * `extras` - Raw regexes, named `extra_0`, `extra_1`, ... in order
    ///
    /// # Returns
    ///
    /// The combined set, or the first [`ConfigError::InvalidPattern`].
    pub fn with_extras(variable: &str, extras: &[String]) -> Result<Self, ConfigError> {
        let mut set = Self::for_variable(variable)?;
        for (i, raw) in extras.iter().enumerate() {
            set.push(ExtractionPattern::new(format!("extra_{i}"), raw)?);
        }
        Ok(set)
    }

    /// Pattern names in precedence order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(ExtractionPattern::name)
    }

    /// Number of patterns, built-ins included.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Scan `bodies` in order and return the first span any pattern isolates.
    #[instrument(level = "debug", skip_all)]
    pub fn extract<I, S>(&self, bodies: I) -> Option<Extracted>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scanned = 0usize;
        for (source_index, body) in bodies.into_iter().enumerate() {
            scanned += 1;
            let body = body.as_ref();
            for pattern in &self.patterns {
                if let Some(span) = pattern.find(body) {
                    debug!(
                        source_index,
                        pattern = pattern.name(),
                        bytes = span.len(),
                        "Payload span located"
                    );
                    return Some(Extracted {
                        span: span.to_string(),
                        source_index,
                        pattern: pattern.name().to_string(),
                    });
                }
            }
        }
        debug!(scanned, "No pattern matched any script body");
        None
    }
}

/// An isolated object-literal span and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub span: String,
    /// Index of the script body in document order.
    pub source_index: usize,
    /// Name of the pattern that matched.
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> PatternSet {
        PatternSet::for_variable("confData").unwrap()
    }

    #[test]
    fn test_builtin_order() {
        let set = set();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, ["end_of_script", "newline_then_end", "bare_semicolon"]);
    }

    #[test]
    fn test_end_of_script_multiline() {
        let body = "\n  var x = 1;\n  let confData = {\n    \"name\": \"A\",\n    \"times\": []\n  };";
        let found = set().extract([body]).unwrap();
        assert_eq!(found.pattern, "end_of_script");
        assert!(found.span.starts_with('{'));
        assert!(found.span.ends_with('}'));
        assert!(found.span.contains("\"times\": []"));
    }

    #[test]
    fn test_end_of_script_trailing_space() {
        let body = r#"let confData = {"name":"A"}; "#;
        let found = set().extract([body]).unwrap();
        assert_eq!(found.pattern, "end_of_script");
        assert_eq!(found.span, r#"{"name":"A"}"#);
    }

    #[test]
    fn test_newline_then_end() {
        let body = "let confData = {\"name\":\"A\",\n\"n\":{\"a\":1}};\n    ";
        let found = set().extract([body]).unwrap();
        assert_eq!(found.pattern, "newline_then_end");
        assert_eq!(found.span, "{\"name\":\"A\",\n\"n\":{\"a\":1}}");
    }

    #[test]
    fn test_bare_semicolon_when_not_last_statement() {
        let body = "let confData = {\"name\":\"A\"};\nstartClock();\n";
        let found = set().extract([body]).unwrap();
        assert_eq!(found.pattern, "bare_semicolon");
        assert_eq!(found.span, "{\"name\":\"A\"}");
    }

    #[test]
    fn test_anchor_keeps_nested_braces() {
        // `bare_semicolon` alone would stop at the inner `};` in the string.
        let body = r#"let confData = {"name":"x};y","times":{"a":1}};"#;
        let found = set().extract([body]).unwrap();
        assert_eq!(found.pattern, "end_of_script");
        assert_eq!(found.span, r#"{"name":"x};y","times":{"a":1}}"#);
    }

    #[test]
    fn test_anchored_span_stops_at_next_statement() {
        let body = "let confData = {\"name\":\"A\"};\nlet other = {\"b\":1};";
        let found = set().extract([body]).unwrap();
        assert_eq!(found.pattern, "bare_semicolon");
        assert_eq!(found.span, r#"{"name":"A"}"#);

        let body = "let confData = {\n  \"name\": \"A\"\n};\nvar other = {\"b\":1};\n";
        let found = set().extract([body]).unwrap();
        assert_eq!(found.span, "{\n  \"name\": \"A\"\n}");
        assert!(crate::payload::parse(&found.span).is_ok());
    }

    #[test]
    fn test_first_matching_body_wins() {
        let miss = "window.dataLayer = [];";
        let hit_a = r#"let confData = {"name":"A"};"#;
        let hit_b = r#"let confData = {"name":"B"};"#;

        let found = set().extract([miss, hit_a]).unwrap();
        assert_eq!(found.source_index, 1);
        assert!(found.span.contains("\"A\""));

        let found = set().extract([hit_a, miss]).unwrap();
        assert_eq!(found.source_index, 0);

        let found = set().extract([hit_b, hit_a]).unwrap();
        assert!(found.span.contains("\"B\""));
    }

    #[test]
    fn test_stops_scanning_after_match() {
        let mut seen = Vec::new();
        let bodies = ["nope", r#"let confData = {"a":1};"#, "never"];
        let found = set().extract(bodies.iter().inspect(|b| seen.push(b.to_string())));
        assert!(found.is_some());
        assert_eq!(seen, ["nope", r#"let confData = {"a":1};"#]);
    }

    #[test]
    fn test_not_found() {
        assert!(set().extract(["let other = {};", "confData.name"]).is_none());
        assert!(set().extract(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_other_variable_ignored() {
        assert!(set().extract([r#"let confDataOld = {"a":1};"#]).is_none());
    }

    #[test]
    fn test_custom_variable_and_extra_pattern() {
        let extras = vec![r"(?s)window\.__CONF__\s*=\s*(\{.*\})".to_string()];
        let set = PatternSet::with_extras("mosqueConf", &extras).unwrap();
        assert_eq!(set.len(), 4);

        let found = set.extract([r#"const mosqueConf = {"a":1};"#]).unwrap();
        assert_eq!(found.span, r#"{"a":1}"#);

        let found = set.extract([r#"window.__CONF__ = {"b":2}"#]).unwrap();
        assert_eq!(found.pattern, "extra_0");
        assert_eq!(found.span, r#"{"b":2}"#);
    }

    #[test]
    fn test_invalid_extra_pattern() {
        let err = PatternSet::with_extras("confData", &["(unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        let err = PatternSet::with_extras("confData", &["no_group".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
