//! Body formatters.
//!
//! A [`Formatter`] rewrites a body for display, typically pretty-printing a
//! structured payload. Formatters are tried in registration order and the
//! first one whose [`matches`](Formatter::matches) returns `true` is used.

use crate::error::FormatError;
use crate::fault;
use serde::de::IgnoredAny;
use std::fmt;
use std::sync::Arc;

/// Rewrites a body before it is printed.
///
/// # Example
///
/// ```
/// use wiretrace_core::{FormatError, Formatter};
///
/// struct Upper;
///
/// impl Formatter for Upper {
///     fn matches(&self, media_type: &str, _sample: &[u8]) -> bool {
///         media_type == "text/plain"
///     }
///
///     fn format(&self, body: &[u8]) -> Result<String, FormatError> {
///         Ok(String::from_utf8_lossy(body).to_uppercase())
///     }
/// }
/// ```
pub trait Formatter: Send + Sync {
    /// Whether this formatter handles a body of the given media type.
    /// `media_type` is empty when the message carries no `Content-Type`.
    fn matches(&self, media_type: &str, sample: &[u8]) -> bool;

    /// Produce the display form of `body`.
    fn format(&self, body: &[u8]) -> Result<String, FormatError>;
}

/// Re-indents JSON with a four space indent.
///
/// Only the whitespace between tokens changes. Number literals, string
/// escapes, key order and repeated keys are printed as they arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

const INDENT: &str = "    ";

impl Formatter for JsonFormatter {
    fn matches(&self, media_type: &str, _sample: &[u8]) -> bool {
        media_type == "application/json" || media_type.ends_with("+json")
    }

    fn format(&self, body: &[u8]) -> Result<String, FormatError> {
        serde_json::from_slice::<IgnoredAny>(body)?;
        let text = std::str::from_utf8(body).map_err(|e| FormatError::new(e.to_string()))?;
        Ok(reindent(text))
    }
}

/// Token-level re-indent of a document already known to be valid JSON.
fn reindent(json: &str) -> String {
    let mut out = String::with_capacity(json.len() * 2);
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = json.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                out.push(c);
                while chars.next_if(|c| c.is_ascii_whitespace()).is_some() {}
                // Empty containers stay on one line.
                match chars.next_if(|c| matches!(c, '}' | ']')) {
                    Some(close) => out.push(close),
                    None => {
                        depth += 1;
                        newline(&mut out, depth);
                    }
                }
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                newline(&mut out, depth);
                out.push(c);
            }
            ',' => {
                out.push(c);
                newline(&mut out, depth);
            }
            ':' => out.push_str(": "),
            c if c.is_ascii_whitespace() => {}
            c => out.push(c),
        }
    }

    out
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

/// What became of a body after the formatters ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Formatted {
    /// Soft-error lines to print before the body.
    pub(crate) notes: Vec<String>,
    /// The text to print.
    pub(crate) text: String,
}

/// Ordered set of formatters.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    formatters: Vec<Arc<dyn Formatter>>,
}

impl FormatterRegistry {
    /// An empty registry; bodies print as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a formatter. Earlier registrations take precedence.
    pub fn push(&mut self, formatter: Arc<dyn Formatter>) {
        self.formatters.push(formatter);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.push(Arc::new(formatter));
        self
    }

    /// Number of registered formatters.
    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    /// Whether no formatter is registered.
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// Run the first matching formatter over `body`.
    ///
    /// Every user call is isolated: a panicking matcher is reported and
    /// skipped, a failing or panicking transform is reported and the raw
    /// body is printed instead.
    pub(crate) fn format(&self, media_type: &str, body: &[u8]) -> Formatted {
        let mut notes = Vec::new();

        for formatter in &self.formatters {
            match fault::isolate(|| formatter.matches(media_type, body)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(panic) => {
                    notes.push(format!("panic while testing body format: {panic}"));
                    continue;
                }
            }

            match fault::isolate(|| formatter.format(body)) {
                Ok(Ok(text)) => return Formatted { notes, text },
                Ok(Err(err)) => notes.push(format!("body cannot be formatted: {err}")),
                Err(panic) => notes.push(format!("body cannot be formatted: panic: {panic}")),
            }
            break;
        }

        Formatted {
            notes,
            text: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("formatters", &self.formatters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct PanickingFormatter;

    impl Formatter for PanickingFormatter {
        fn matches(&self, _: &str, _: &[u8]) -> bool {
            true
        }

        fn format(&self, _: &[u8]) -> Result<String, FormatError> {
            panic!("evil formatter")
        }
    }

    struct PanickingMatcher;

    impl Formatter for PanickingMatcher {
        fn matches(&self, _: &str, _: &[u8]) -> bool {
            panic!("evil matcher")
        }

        fn format(&self, _: &[u8]) -> Result<String, FormatError> {
            Ok("never".into())
        }
    }

    #[test]
    fn json_matches_media_types() {
        assert!(JsonFormatter.matches("application/json", b""));
        assert!(JsonFormatter.matches("application/problem+json", b""));
        assert!(!JsonFormatter.matches("text/plain", b""));
        assert!(!JsonFormatter.matches("", b""));
    }

    #[test]
    fn json_indents_with_four_spaces_in_order() {
        let out = JsonFormatter
            .format(br#"{"result":"Hello, world!","number":3.14}"#)
            .unwrap();
        assert_eq!(out, "{\n    \"result\": \"Hello, world!\",\n    \"number\": 3.14\n}");
    }

    #[test]
    fn json_keeps_literals_as_sent() {
        let out = JsonFormatter
            .format(br#"{"price":1.10,"exp":1e2,"big":123456789012345678901234567890,"dup":1,"dup":2}"#)
            .unwrap();
        assert_eq!(
            out,
            "{\n    \"price\": 1.10,\n    \"exp\": 1e2,\n    \"big\": 123456789012345678901234567890,\n    \"dup\": 1,\n    \"dup\": 2\n}"
        );
    }

    #[test]
    fn json_strings_and_empty_containers_are_untouched() {
        let out = JsonFormatter
            .format(br#"{ "a" : "x, {y}: \"z\" [ ]" , "e":[ ], "o":{}, "n":[1, [2]] }"#)
            .unwrap();
        assert_eq!(
            out,
            r#"{
    "a": "x, {y}: \"z\" [ ]",
    "e": [],
    "o": {},
    "n": [
        1,
        [
            2
        ]
    ]
}"#
        );
    }

    #[test]
    fn json_scalar_document() {
        assert_eq!(JsonFormatter.format(b" 42 \n").unwrap(), "42");
        assert_eq!(JsonFormatter.format(br#""hi""#).unwrap(), r#""hi""#);
    }

    #[test]
    fn bad_json_reports_and_prints_raw() {
        let registry = FormatterRegistry::new().with(JsonFormatter);
        let formatted = registry.format("application/json", br#"{"bad": }"#);
        assert_eq!(formatted.notes.len(), 1);
        assert!(formatted.notes[0].starts_with("body cannot be formatted: "));
        assert_eq!(formatted.text, r#"{"bad": }"#);
    }

    #[test]
    fn panicking_formatter_prints_raw() {
        let registry = FormatterRegistry::new().with(PanickingFormatter);
        let formatted = registry.format("application/json", b"raw");
        assert_eq!(
            formatted.notes,
            vec!["body cannot be formatted: panic: evil formatter".to_string()]
        );
        assert_eq!(formatted.text, "raw");
    }

    #[test]
    fn panicking_matcher_falls_through_to_next() {
        let registry = FormatterRegistry::new()
            .with(PanickingMatcher)
            .with(JsonFormatter);
        let formatted = registry.format("application/json", br#"{"a":1}"#);
        assert_eq!(
            formatted.notes,
            vec!["panic while testing body format: evil matcher".to_string()]
        );
        assert_eq!(formatted.text, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn first_match_wins() {
        struct Fixed(&'static str);

        impl Formatter for Fixed {
            fn matches(&self, _: &str, _: &[u8]) -> bool {
                true
            }

            fn format(&self, _: &[u8]) -> Result<String, FormatError> {
                Ok(self.0.to_string())
            }
        }

        let registry = FormatterRegistry::new()
            .with(Fixed("first"))
            .with(Fixed("second"));
        assert_eq!(registry.format("text/plain", b"x").text, "first");
    }

    #[test]
    fn no_match_prints_raw() {
        let registry = FormatterRegistry::new().with(JsonFormatter);
        let formatted = registry.format("text/plain", b"Hello, world!");
        assert!(formatted.notes.is_empty());
        assert_eq!(formatted.text, "Hello, world!");
    }

    fn json_value() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
                prop::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(|entries| {
                    serde_json::Value::Object(entries.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn json_output_reparses_to_same_value(value in json_value()) {
            let compact = serde_json::to_vec(&value).unwrap();
            let pretty = JsonFormatter.format(&compact).unwrap();
            let reparsed: serde_json::Value = serde_json::from_str(&pretty).unwrap();
            prop_assert_eq!(reparsed, value);
        }
    }
}
