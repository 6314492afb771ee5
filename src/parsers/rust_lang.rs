use super::{is_user_code, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct RustParser;

impl LanguageParser for RustParser {
    fn language_name(&self) -> &'static str {
        "Rust"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        if stderr.contains("panicked at") {
            return Confidence::High;
        }
        if stderr.contains(".rs:") {
            return Confidence::Medium;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let lines: Vec<&str> = stderr.lines().collect();

        let old_re =
            Regex::new(r"^thread '([^']+)' panicked at '(.*)', (\S+):(\d+):(\d+)$").unwrap();
        let new_header_re =
            Regex::new(r"^thread '([^']+)' panicked at (\S+):(\d+):(\d+):$").unwrap();

        let mut frames = Vec::new();
        let mut message = None;

        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if let Some(caps) = old_re.captures(trimmed) {
                let file_path = caps[3].to_string();
                let line_no: u32 = caps[4].parse().unwrap_or(0);
                let col: u32 = caps[5].parse().unwrap_or(0);
                message = Some(caps[2].to_string());
                frames.push(StackFrame {
                    file_path: Some(file_path.clone()),
                    line: Some(line_no),
                    column: Some(col),
                    function_name: None,
                    class_name: None,
                    is_user_code: is_user_code(&file_path),
                    snippet: None,
                });
                break;
            }
            if let Some(caps) = new_header_re.captures(trimmed) {
                let file_path = caps[2].to_string();
                let line_no: u32 = caps[3].parse().unwrap_or(0);
                let col: u32 = caps[4].parse().unwrap_or(0);
                message = lines.get(idx + 1).map(|m| m.trim().to_string());
                frames.push(StackFrame {
                    file_path: Some(file_path.clone()),
                    line: Some(line_no),
                    column: Some(col),
                    function_name: None,
                    class_name: None,
                    is_user_code: is_user_code(&file_path),
                    snippet: None,
                });
                break;
            }
        }

        frames.extend(backtrace_frames(stderr));

        if frames.is_empty() && message.is_none() {
            return ParseResult::failure(stderr.to_string());
        }

        let exception = Some(ExceptionInfo {
            exception_type: "panic".to_string(),
            message: message.unwrap_or_default(),
            inner: None,
        });

        ParseResult::success(exception, frames)
    }
}

/// Additional frames from an explicit `RUST_BACKTRACE=1` dump, if present:
/// `N: function_name` followed by an indented `at file:line:col` line.
fn backtrace_frames(stderr: &str) -> Vec<StackFrame> {
    let func_re = Regex::new(r"^\s*\d+:\s+(.+)$").unwrap();
    let loc_re = Regex::new(r"^\s*at\s+(\S+):(\d+):(\d+)\s*$").unwrap();

    let lines: Vec<&str> = stderr.lines().collect();
    let mut frames = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if let Some(func_caps) = func_re.captures(lines[i]) {
            if i + 1 < lines.len() {
                if let Some(loc_caps) = loc_re.captures(lines[i + 1]) {
                    let function_name = func_caps[1].trim().to_string();
                    let file_path = loc_caps[1].to_string();
                    let line_no: u32 = loc_caps[2].parse().unwrap_or(0);
                    let col: u32 = loc_caps[3].parse().unwrap_or(0);
                    let is_user = is_user_code(&function_name) && is_user_code(&file_path);
                    frames.push(StackFrame {
                        file_path: Some(file_path),
                        line: Some(line_no),
                        column: Some(col),
                        function_name: Some(function_name),
                        class_name: None,
                        is_user_code: is_user,
                        snippet: None,
                    });
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_parse_high_on_panicked_at() {
        let parser = RustParser;
        assert_eq!(
            parser.can_parse("thread 'main' panicked at 'oops', src/main.rs:10:5"),
            Confidence::High
        );
    }

    #[test]
    fn test_parse_old_form() {
        let parser = RustParser;
        let result = parser.parse("thread 'main' panicked at 'index out of bounds', src/main.rs:10:5\nnote: run with `RUST_BACKTRACE=1`");
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.message, "index out of bounds");
        assert_eq!(result.frames[0].file_path.as_deref(), Some("src/main.rs"));
        assert_eq!(result.frames[0].line, Some(10));
    }

    #[test]
    fn test_parse_new_form_reads_message_from_next_line() {
        let parser = RustParser;
        let result = parser.parse(
            "thread 'main' panicked at src/main.rs:10:5:\nindex out of bounds: the len is 3 but the index is 5",
        );
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.message, "index out of bounds: the len is 3 but the index is 5");
        assert_eq!(result.frames[0].line, Some(10));
    }

    #[test]
    fn test_parse_marks_rustc_frames_as_library() {
        let parser = RustParser;
        let stderr = "thread 'main' panicked at src/main.rs:10:5:\nboom\nstack backtrace:\n   0: core::panicking::panic\n             at /rustc/abc123/library/core/src/panicking.rs:50:5";
        let result = parser.parse(stderr);
        assert!(result.frames.iter().any(|f| !f.is_user_code));
    }
}
