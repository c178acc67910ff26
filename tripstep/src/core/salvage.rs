//! Recovery parser for model replies.
//!
//! Tries, in order: strict JSON, then each balanced `{...}` span after fence
//! stripping, parsed strictly or with literal-structure syntax (single
//! quotes, `True`/`False`/`None`, trailing commas) rewritten to JSON. The
//! first span that parses wins.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SalvageError {
    #[error("model reply is empty")]
    Empty,
    #[error("model reply is not a JSON object")]
    NotAnObject,
    #[error("model reply contains no JSON object")]
    NoObject,
    #[error("model reply object could not be parsed: {0}")]
    Malformed(String),
    #[error("model reply has no action and none can be inferred")]
    NoDiscriminator,
}

/// Extract the single JSON object a reply is supposed to be.
pub fn salvage_object(content: &str) -> Result<Map<String, Value>, SalvageError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(SalvageError::Empty);
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Object(map) => Ok(map),
            _ => Err(SalvageError::NotAnObject),
        };
    }

    let body = strip_fences(trimmed);
    let mut first_error = None;
    for (start, _) in body.match_indices('{') {
        let Some(span) = balanced_span(body, start) else {
            continue;
        };
        match parse_span(span) {
            Ok(map) => return Ok(map),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    Err(first_error.unwrap_or(SalvageError::NoObject))
}

fn parse_span(span: &str) -> Result<Map<String, Value>, SalvageError> {
    let value = match serde_json::from_str::<Value>(span) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(&literal_to_json(span))
            .map_err(|err| SalvageError::Malformed(err.to_string()))?,
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(SalvageError::NotAnObject),
    }
}

/// Fill in a missing `action` from the fields that are present.
///
/// `target_idx` implies tap, `keycode` implies key, non-empty `text` implies type.
pub fn ensure_discriminator(object: &mut Map<String, Value>) -> Result<(), SalvageError> {
    if object.get("action").is_some_and(|v| !v.is_null()) {
        return Ok(());
    }
    let present = |key: &str| object.get(key).is_some_and(|v| !v.is_null());
    let inferred = if present("target_idx") || present("target_index") {
        "tap"
    } else if present("keycode") {
        "key"
    } else if object
        .get("text")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty())
    {
        "type"
    } else {
        return Err(SalvageError::NoDiscriminator);
    };
    object.insert("action".to_string(), Value::String(inferred.to_string()));
    Ok(())
}

fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
    }
    body.trim_end().trim_end_matches("```").trim()
}

/// Balanced `{...}` span opening at byte `start`, skipping braces inside quoted strings.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn literal_to_json(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Copy one quoted string as a JSON string; returns the index after it.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                if next == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(next);
                }
                i += 2;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
        i += 1;
    }
    i
}
