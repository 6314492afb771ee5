//! C6 — Response Parser: extracts a JSON object from free-form LLM output,
//! normalizes the legacy edit schema, and validates the result. Grounded in
//! `cosmos::suggest::llm::parse`'s toolkit of
//! `strip_markdown_fences`/`extract_json_fragment`/`parse_json_with_retry`.

use crate::model::{FixEdit, FixSuggestion};
use regex::Regex;
use serde::Deserialize;

const MAX_EXPLANATION_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct RawEdit {
    file_path: String,
    start_line: usize,
    end_line: usize,
    #[serde(default)]
    original_lines: Vec<String>,
    replacement: String,
}

/// Permissive shape accepting both the new (`edits[]`) and legacy
/// (flat `file_path`/`original_lines`/`replacement_lines`) schemas.
#[derive(Debug, Deserialize, Default)]
struct RawFixSuggestion {
    language: Option<String>,
    #[serde(default)]
    edits: Option<Vec<RawEdit>>,
    // Legacy flat fields.
    file_path: Option<String>,
    #[serde(default)]
    original_lines: Option<Vec<String>>,
    #[serde(default)]
    replacement_lines: Option<Vec<String>>,
    start_line: Option<usize>,
    end_line: Option<usize>,
    explanation: Option<String>,
    #[serde(default)]
    confidence: Option<i64>,
}

/// Parses and validates a [`FixSuggestion`] out of arbitrary LLM output.
/// Returns `None` for empty input, unparseable JSON, or anything failing
/// validation (spec §4.6) - there is no partial result.
pub fn parse(text: &str) -> Option<FixSuggestion> {
    if text.trim().is_empty() {
        return None;
    }

    let candidate = extract_json(text)?;
    let raw: RawFixSuggestion = serde_json::from_str(&candidate).ok()?;
    let suggestion = normalize(raw)?;
    validate(&suggestion)?;
    Some(suggestion)
}

/// Isolates a JSON object: first a fenced ```json block, then a fenced
/// plain block, then the first brace-balanced `{...}` found anywhere.
fn extract_json(text: &str) -> Option<String> {
    if let Some(fenced) = extract_fenced(text) {
        return Some(fenced);
    }
    extract_balanced_object(text)
}

fn extract_fenced(text: &str) -> Option<String> {
    let re = Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)```").unwrap();
    re.captures(text).map(|caps| caps[1].trim().to_string())
}

/// Scans for the first `{` and returns the shortest prefix-balanced
/// object, respecting string and escape state so braces inside string
/// literals don't throw off the count.
fn extract_balanced_object(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize(raw: RawFixSuggestion) -> Option<FixSuggestion> {
    let edits = if let Some(edits) = raw.edits {
        edits
            .into_iter()
            .map(|e| FixEdit {
                file_path: e.file_path,
                start_line: e.start_line,
                end_line: e.end_line,
                original_lines: e.original_lines,
                replacement: e.replacement,
            })
            .collect::<Vec<_>>()
    } else {
        let file_path = raw.file_path?;
        let original_lines = raw.original_lines.unwrap_or_default();
        let replacement_lines = raw.replacement_lines.unwrap_or_default();
        let start_line = raw.start_line.unwrap_or(1);
        let end_line = raw
            .end_line
            .unwrap_or(start_line + original_lines.len().saturating_sub(1));
        vec![FixEdit {
            file_path,
            start_line,
            end_line,
            original_lines,
            replacement: replacement_lines.join("\n"),
        }]
    };

    Some(FixSuggestion {
        language: raw.language,
        edits,
        explanation: raw.explanation,
        confidence: raw.confidence.unwrap_or(0).clamp(0, 255) as u8,
    })
}

fn validate(suggestion: &FixSuggestion) -> Option<()> {
    if suggestion.edits.is_empty() {
        return None;
    }

    for edit in &suggestion.edits {
        if edit.file_path.is_empty()
            || edit.start_line < 1
            || edit.end_line < edit.start_line
            || edit.original_lines.is_empty()
        {
            return None;
        }
    }

    if suggestion.confidence > 100 {
        return None;
    }

    if let Some(explanation) = &suggestion.explanation {
        if explanation.chars().count() > MAX_EXPLANATION_CHARS {
            return None;
        }
    }

    if has_overlap(&suggestion.edits) {
        return None;
    }

    Some(())
}

/// Groups edits by file and checks, after sorting by `start_line`, that
/// each edit ends strictly before the next one starts (spec §4.6, §8
/// invariant 6).
fn has_overlap(edits: &[FixEdit]) -> bool {
    use std::collections::HashMap;

    let mut by_file: HashMap<&str, Vec<&FixEdit>> = HashMap::new();
    for edit in edits {
        by_file.entry(edit.file_path.as_str()).or_default().push(edit);
    }

    for group in by_file.values_mut() {
        group.sort_by_key(|e| e.start_line);
        for pair in group.windows(2) {
            if pair[0].end_line >= pair[1].start_line {
                return true;
            }
        }
    }
    false
}
