//! Output extraction: pull a JSON value out of free-form model text
//!
//! Models reliably bracket their structured answer but often wrap it in
//! prose or code fences, and now and then slip in `//` comments or trailing
//! commas. The pass here is deliberately narrow:
//!
//! 1. drop code fence markers outside string literals
//! 2. cut from the first `{`/`[` to the last matching closer
//! 3. drop line comments outside string literals
//! 4. drop commas directly before `]`/`}` outside string literals
//! 5. parse, retrying with the other bracket kind if the first cut fails

use serde_json::Value;
use tracing::debug;

use crate::error::{snippet, PlanError};

const FENCE: &str = "```";

/// Locate, clean and parse the JSON payload inside `raw`.
pub fn extract_json(raw: &str) -> Result<Value, PlanError> {
    let unfenced = strip_code_fences(raw);

    let mut candidates = [locate_json(&unfenced, '{', '}'), locate_json(&unfenced, '[', ']')];
    // the bracket that opens first wins; the other is a fallback for stray
    // brackets in surrounding prose
    candidates.sort_by_key(|c| c.map_or(usize::MAX, |(start, _)| start));

    let mut first_failure = None;
    for (_, candidate) in candidates.into_iter().flatten() {
        let cleaned = clean_json(candidate);
        debug!(len = cleaned.len(), "Extracted JSON candidate from model output");

        match serde_json::from_str(&cleaned) {
            Ok(value) => return Ok(value),
            Err(source) if first_failure.is_none() => {
                first_failure = Some(PlanError::MalformedJson {
                    source,
                    snippet: snippet(&cleaned),
                });
            }
            Err(_) => {}
        }
    }

    Err(first_failure.unwrap_or_else(|| PlanError::NoJsonFound {
        snippet: snippet(raw),
    }))
}

/// Remove comments and trailing commas, leaving string contents intact.
pub fn clean_json(text: &str) -> String {
    strip_trailing_commas(&strip_line_comments(text))
        .trim()
        .to_string()
}

/// Remove ``` markers, and a language tag glued to each, outside string
/// literals.
fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if !state.in_string && rest.starts_with(FENCE) {
            rest = &rest[FENCE.len()..];
            let tag_len = rest
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            rest = &rest[tag_len..];
            continue;
        }
        state.consume(c);
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}

/// Start offset and slice from the first `open` to the last `close`,
/// inclusive.
fn locate_json(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

/// Tracks whether a scan position sits inside a JSON string literal.
#[derive(Default)]
struct StringState {
    in_string: bool,
    escaped: bool,
}

impl StringState {
    /// Feed one character; returns true when it belongs to a string literal
    /// (including the closing quote).
    fn consume(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return true;
        }
        if c == '"' {
            self.in_string = true;
            return true;
        }
        false
    }
}

fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if state.consume(c) {
            out.push(c);
            continue;
        }
        if c == '/' && chars.peek() == Some(&'/') {
            // Skip to end of line, keeping the newline itself.
            for skipped in chars.by_ref() {
                if skipped == '\n' {
                    out.push('\n');
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }

    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();

    for (i, &c) in chars.iter().enumerate() {
        if state.consume(c) {
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().copied().find(|n| !n.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(c);
    }

    out
}
