//! C1 — Source Snippet Reader.
//!
//! Reads a bounded window of text lines around a 1-based target line,
//! detecting encoding by BOM the way [`crate::patcher`] does for its own
//! read phase (the two share the same BOM table by design - see
//! [`Encoding::detect`]).

use crate::model::{SourceLine, SourceSnippet};
use std::path::{Path, PathBuf};

/// Guard against reading unreasonably large files into memory.
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Byte-order-mark-detected text encoding. Only the BOM is inspected; the
/// content itself is decoded lossily as UTF-8 once the mark is stripped,
/// since every target language here emits effectively-ASCII source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Be,
}

impl Encoding {
    /// Detects the BOM at the start of `bytes`, returning the encoding and
    /// the number of leading bytes that made up the mark (0 if none).
    pub fn detect(bytes: &[u8]) -> (Encoding, usize) {
        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            (Encoding::Utf8, 3)
        } else if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
            (Encoding::Utf32Be, 4)
        } else if bytes.starts_with(&[0xFE, 0xFF]) {
            (Encoding::Utf16Be, 2)
        } else if bytes.starts_with(&[0xFF, 0xFE]) {
            (Encoding::Utf16Le, 2)
        } else {
            (Encoding::Utf8, 0)
        }
    }

    /// Decodes the post-BOM bytes to a `String`. Only UTF-8 is a lossless
    /// round trip here; the wide encodings are decoded on a best-effort
    /// basis since this crate's job is to display source text to an LLM,
    /// not to re-emit it untouched (that precision lives in
    /// [`crate::patcher`], which keeps the original bytes around).
    pub fn decode(self, body: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
            Encoding::Utf16Le => decode_utf16_with(body, u16::from_le_bytes),
            Encoding::Utf16Be => decode_utf16_with(body, u16::from_be_bytes),
            Encoding::Utf32Be => decode_utf32_be(body),
        }
    }
}

fn decode_utf16_with(body: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| from_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn decode_utf32_be(body: &[u8]) -> String {
    body.chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .map(|code| char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Splits text on `\r\n`, `\r`, or `\n` without losing empty trailing
/// lines from a non-final separator.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += 1;
                if i < bytes.len() && bytes[i] == b'\n' {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() || lines.is_empty() || start == bytes.len() {
        if start <= bytes.len() {
            lines.push(&text[start..]);
        }
    }
    lines
}

/// Reads a bounded window of source text around `error_line`.
///
/// Returns `None` on any I/O failure or invalid argument, per the
/// "never raises" contract - callers treat a missing snippet as
/// "context unavailable", not an error.
pub fn read_context(path: &Path, error_line: usize, window: usize) -> Option<SourceSnippet> {
    if path.as_os_str().is_empty() || error_line == 0 || window == 0 {
        return None;
    }

    let resolved = resolve_path(path);
    let metadata = std::fs::metadata(&resolved).ok()?;
    if metadata.len() > MAX_FILE_BYTES {
        return None;
    }

    let bytes = std::fs::read(&resolved).ok()?;
    let (encoding, bom_len) = Encoding::detect(&bytes);
    let text = encoding.decode(&bytes[bom_len..]);
    let all_lines = split_lines(&text);
    let total_lines = all_lines.len();
    if total_lines == 0 || error_line > total_lines {
        return None;
    }

    let (start_line, end_line) = centered_window(error_line, window, total_lines);

    let lines = (start_line..=end_line)
        .map(|line_number| SourceLine {
            line_number,
            content: all_lines[line_number - 1].to_string(),
            is_error_line: line_number == error_line,
        })
        .collect();

    Some(SourceSnippet {
        file_path: resolved,
        start_line,
        end_line,
        error_line,
        lines,
    })
}

/// Resolves a relative path against the process working directory,
/// falling back to the path as given if the working directory cannot be
/// determined.
fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Computes `[start_line, end_line]` clamped to `[1, total_lines]`,
/// extending the opposite end when one side is clamped so the window
/// still spans up to `2*window + 1` lines whenever the file has room.
fn centered_window(error_line: usize, window: usize, total_lines: usize) -> (usize, usize) {
    let low = error_line.saturating_sub(window).max(1);
    let high = (error_line + window).min(total_lines);

    let low_clamped = error_line < window + 1;
    let high_clamped = error_line + window > total_lines;

    let low = if high_clamped && !low_clamped {
        let deficit = (error_line + window) - total_lines;
        low.saturating_sub(deficit).max(1)
    } else {
        low
    };

    let high = if low_clamped && !high_clamped {
        let deficit = (window + 1) - error_line;
        (high + deficit).min(total_lines)
    } else {
        high
    };

    (low, high)
}
