//! Data model shared by every stage of the crash->context->fix pipeline.
//!
//! Mirrors the shape of `cosmos::suggest::Suggestion` / `cosmos::diff::UnifiedDiff`:
//! plain data structs, `Debug + Clone`, constructed with a `new` plus builder-style
//! `with_*` methods rather than public-field literals everywhere a caller assembles
//! one incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Captured standard-error text and the circumstances under which it was captured.
///
/// Immutable after construction - every stage downstream of the runner borrows
/// or clones out of this, never mutates it in place.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub stderr: String,
    pub exit_code: i32,
    pub command: String,
    pub working_directory: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl CrashReport {
    pub fn new(
        stderr: impl Into<String>,
        exit_code: i32,
        command: impl Into<String>,
        working_directory: PathBuf,
    ) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            command: command.into(),
            working_directory,
            timestamp: Utc::now(),
        }
    }
}

/// A single line of source text attached to a [`SourceSnippet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    pub line_number: usize,
    pub content: String,
    pub is_error_line: bool,
}

/// A bounded window of file text centered (as closely as the file allows) on
/// the line a stack frame points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnippet {
    pub file_path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    pub error_line: usize,
    pub lines: Vec<SourceLine>,
}

impl SourceSnippet {
    /// Raw line contents with no numbers, gutters, or markers - what the
    /// prompt synthesizer embeds verbatim.
    pub fn raw_code(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One frame of a parsed stack trace.
///
/// Valid only if at least one of (file_path + line) or (function_name /
/// class_name) is known; parsers are responsible for only emitting valid
/// frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub file_path: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
    pub is_user_code: bool,
    pub snippet: Option<SourceSnippet>,
}

impl StackFrame {
    pub fn is_valid(&self) -> bool {
        (self.file_path.is_some() && self.line.is_some())
            || self.function_name.is_some()
            || self.class_name.is_some()
    }
}

/// The exception or panic that triggered the crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub exception_type: String,
    pub message: String,
    pub inner: Option<String>,
}

/// Best-effort structured extraction produced by a single language parser.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub success: bool,
    pub exception: Option<ExceptionInfo>,
    pub frames: Vec<StackFrame>,
    pub raw_error: Option<String>,
}

impl ParseResult {
    pub fn failure(raw_error: impl Into<String>) -> Self {
        Self {
            success: false,
            exception: None,
            frames: Vec::new(),
            raw_error: Some(raw_error.into()),
        }
    }

    pub fn success(exception: Option<ExceptionInfo>, frames: Vec<StackFrame>) -> Self {
        Self {
            success: true,
            exception,
            frames,
            raw_error: None,
        }
    }
}

/// Enriched, language-tagged view of a crash, ready to be handed to the
/// prompt synthesizer.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub language: String,
    pub exception: ExceptionInfo,
    pub frames: Vec<StackFrame>,
    pub primary_frame: Option<StackFrame>,
    pub original_command: String,
    pub working_directory: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// A single contiguous line-range replacement in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixEdit {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub original_lines: Vec<String>,
    pub replacement: String,
}

/// A validated, structured patch proposal from the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixSuggestion {
    pub language: Option<String>,
    pub edits: Vec<FixEdit>,
    pub explanation: Option<String>,
    pub confidence: u8,
}

/// Outcome of applying (or attempting to apply) a [`FixSuggestion`] to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub success: bool,
    pub backup_path: PathBuf,
    pub error_message: Option<String>,
}

impl PatchResult {
    pub fn ok(backup_path: PathBuf) -> Self {
        Self {
            success: true,
            backup_path,
            error_message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            backup_path: PathBuf::new(),
            error_message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_frame_valid_with_file_and_line() {
        let frame = StackFrame {
            file_path: Some("a.py".to_string()),
            line: Some(3),
            ..Default::default()
        };
        assert!(frame.is_valid());
    }

    #[test]
    fn test_stack_frame_valid_with_function_only() {
        let frame = StackFrame {
            function_name: Some("divide".to_string()),
            ..Default::default()
        };
        assert!(frame.is_valid());
    }

    #[test]
    fn test_stack_frame_invalid_when_empty() {
        let frame = StackFrame::default();
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_source_snippet_raw_code_joins_with_newline() {
        let snippet = SourceSnippet {
            file_path: PathBuf::from("a.py"),
            start_line: 1,
            end_line: 2,
            error_line: 2,
            lines: vec![
                SourceLine {
                    line_number: 1,
                    content: "def f():".to_string(),
                    is_error_line: false,
                },
                SourceLine {
                    line_number: 2,
                    content: "    return 1 / 0".to_string(),
                    is_error_line: true,
                },
            ],
        };
        assert_eq!(snippet.raw_code(), "def f():\n    return 1 / 0");
    }
}
