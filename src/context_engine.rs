//! C4 — Context Engine: orchestrates C3 → parse → C1 snippet attachment →
//! primary-frame selection, the way `cosmos::workflow::Workflow` sequences
//! its own stages behind one `process`-style entry point, with a
//! fallback path modeled on `cosmos::context::WorkContext::load`'s
//! fail-safe-to-default behavior.

use crate::model::{CrashReport, ErrorContext, ExceptionInfo, StackFrame};
use crate::parsers::registry::ParserRegistry;
use crate::snippet;
use crate::util::truncate;

const DEFAULT_WINDOW: usize = 5;

pub struct ContextEngine {
    registry: ParserRegistry,
}

impl ContextEngine {
    pub fn new() -> Self {
        Self {
            registry: ParserRegistry::new(),
        }
    }

    /// Returns `None` only when `report.stderr` is empty; every other
    /// failure mode degrades to a fallback `ErrorContext` (spec §4.4).
    pub fn process(&self, report: &CrashReport) -> Option<ErrorContext> {
        if report.stderr.trim().is_empty() {
            return None;
        }

        let parser = self.registry.best(&report.stderr);
        let parse_result = parser.map(|p| (p.language_name(), p.parse(&report.stderr)));

        let (language, exception, mut frames) = match parse_result {
            Some((lang, result)) if result.success => {
                let exception = result.exception.unwrap_or_else(|| ExceptionInfo {
                    exception_type: "Error".to_string(),
                    message: String::new(),
                    inner: None,
                });
                (lang.to_string(), exception, result.frames)
            }
            _ => (
                "Unknown".to_string(),
                ExceptionInfo {
                    exception_type: "Error".to_string(),
                    message: format!("{}...", truncate(&report.stderr, 200)),
                    inner: None,
                },
                Vec::new(),
            ),
        };

        for frame in &mut frames {
            attach_snippet(frame, &report.working_directory);
        }

        let primary_frame = pick_primary_frame(&frames);

        Some(ErrorContext {
            language,
            exception,
            frames,
            primary_frame,
            original_command: report.command.clone(),
            working_directory: report.working_directory.clone(),
            timestamp: report.timestamp,
        })
    }
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn attach_snippet(frame: &mut StackFrame, working_directory: &std::path::Path) {
    let (Some(file_path), Some(line)) = (&frame.file_path, frame.line) else {
        return;
    };
    let path = std::path::Path::new(file_path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_directory.join(path)
    };
    frame.snippet = snippet::read_context(&resolved, line as usize, DEFAULT_WINDOW);
}

fn pick_primary_frame(frames: &[StackFrame]) -> Option<StackFrame> {
    frames
        .iter()
        .find(|f| f.is_user_code && f.file_path.as_deref().is_some_and(|p| !p.is_empty()))
        .or_else(|| frames.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_process_returns_none_on_empty_stderr() {
        let engine = ContextEngine::new();
        let report = CrashReport::new("", 1, "python x.py", PathBuf::from("/tmp"));
        assert!(engine.process(&report).is_none());
    }

    #[test]
    fn test_process_falls_back_on_unrecognized_stderr() {
        let engine = ContextEngine::new();
        let report = CrashReport::new(
            "segmentation fault (core dumped)",
            139,
            "./a.out",
            PathBuf::from("/tmp"),
        );
        let ctx = engine.process(&report).unwrap();
        assert_eq!(ctx.language, "Unknown");
        assert!(ctx.frames.is_empty());
    }

    #[test]
    fn test_process_attaches_snippet_and_picks_primary_frame() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.py");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "def divide(a, b):").unwrap();
        writeln!(f, "    return a / b").unwrap();

        let stderr = format!(
            "Traceback (most recent call last):\n  File \"{}\", line 2, in divide\n    return a / b\nZeroDivisionError: division by zero",
            file_path.display()
        );
        let engine = ContextEngine::new();
        let report = CrashReport::new(stderr, 1, "python test.py", dir.path().to_path_buf());
        let ctx = engine.process(&report).unwrap();

        assert_eq!(ctx.language, "Python");
        let primary = ctx.primary_frame.unwrap();
        assert!(primary.snippet.is_some());
        assert_eq!(primary.snippet.unwrap().error_line, 2);
    }

    #[test]
    fn test_pick_primary_frame_skips_library_frames() {
        let frames = vec![
            StackFrame {
                file_path: Some("/usr/lib/site-packages/foo.py".to_string()),
                line: Some(1),
                is_user_code: false,
                ..Default::default()
            },
            StackFrame {
                file_path: Some("my_app.py".to_string()),
                line: Some(5),
                is_user_code: true,
                ..Default::default()
            },
        ];
        let primary = pick_primary_frame(&frames).unwrap();
        assert_eq!(primary.file_path.as_deref(), Some("my_app.py"));
    }

    #[test]
    fn test_pick_primary_frame_falls_back_to_first_when_no_user_code() {
        let frames = vec![StackFrame {
            file_path: Some("/usr/lib/site-packages/foo.py".to_string()),
            line: Some(1),
            is_user_code: false,
            ..Default::default()
        }];
        let primary = pick_primary_frame(&frames).unwrap();
        assert!(!primary.is_user_code);
    }
}
