//! Failure modes of a single plan-generation request
//!
//! Every variant is terminal: nothing is retried here and no partial plan
//! is ever returned alongside an error.

use thiserror::Error;

/// Longest slice of model or upstream text carried inside an error
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum PlanError {
    /// The request never produced a response (connect failure, timeout, ...)
    #[error("failed to reach completion endpoint: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("completion endpoint returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("completion response has no choices[0].text: {source} (body: {snippet:?})")]
    InvalidEnvelope {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    #[error("no JSON found in model output: {snippet:?}")]
    NoJsonFound { snippet: String },

    #[error("model output is not valid JSON: {source} (text: {snippet:?})")]
    MalformedJson {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },
}

/// Truncate `text` for inclusion in an error message
pub(crate) fn snippet(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_short_text_untouched() {
        assert_eq!(snippet("  hello  "), "hello");
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let long = "é".repeat(500);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
    }

    #[test]
    fn test_no_json_message_contains_text() {
        let err = PlanError::NoJsonFound {
            snippet: snippet("I cannot help with that"),
        };
        assert!(err.to_string().contains("I cannot help with that"));
    }
}
