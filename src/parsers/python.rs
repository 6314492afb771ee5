use super::{is_user_code, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct PythonParser;

const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

impl LanguageParser for PythonParser {
    fn language_name(&self) -> &'static str {
        "Python"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        if stderr.contains(TRACEBACK_HEADER) {
            return Confidence::High;
        }
        let frame_re = Regex::new(r#"File "(.+)", line (\d+), in (.+)"#).unwrap();
        if frame_re.is_match(stderr) {
            return Confidence::Medium;
        }
        if stderr.contains(".py") || stderr.contains("Error:") {
            return Confidence::Low;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let frame_re = Regex::new(r#"File "(.+)", line (\d+), in (.+)"#).unwrap();
        let mut frames = Vec::new();
        for caps in frame_re.captures_iter(stderr) {
            let file_path = caps[1].to_string();
            let line: u32 = match caps[2].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let function_name = caps[3].trim().to_string();
            let is_user = is_user_code(&file_path);
            frames.push(StackFrame {
                file_path: Some(file_path),
                line: Some(line),
                column: None,
                function_name: Some(function_name),
                class_name: None,
                is_user_code: is_user,
                snippet: None,
            });
        }

        let exception = last_exception_line(stderr);

        if frames.is_empty() && exception.is_none() {
            return ParseResult::failure(stderr.to_string());
        }

        ParseResult::success(exception, frames)
    }
}

/// The final line of a Python traceback is `ExceptionType: message` (or
/// just `ExceptionType` with no message for some built-ins).
fn last_exception_line(stderr: &str) -> Option<ExceptionInfo> {
    let re = Regex::new(r"^([A-Za-z_][\w.]*(?:Error|Exception|Warning)[\w]*)(?::\s*(.*))?$")
        .unwrap();
    stderr
        .lines()
        .rev()
        .find_map(|line| {
            let trimmed = line.trim();
            re.captures(trimmed).map(|caps| ExceptionInfo {
                exception_type: caps[1].to_string(),
                message: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                inner: None,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Traceback (most recent call last):\n  File \"test.py\", line 5, in divide\n    return a / b\nZeroDivisionError: division by zero";

    #[test]
    fn test_can_parse_high_on_traceback_header() {
        let parser = PythonParser;
        assert_eq!(parser.can_parse(SAMPLE), Confidence::High);
    }

    #[test]
    fn test_can_parse_none_on_unrelated_text() {
        let parser = PythonParser;
        assert_eq!(parser.can_parse("segfault (core dumped)"), Confidence::None);
    }

    #[test]
    fn test_parse_extracts_frame_and_exception() {
        let parser = PythonParser;
        let result = parser.parse(SAMPLE);
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "ZeroDivisionError");
        assert_eq!(exc.message, "division by zero");
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.frames[0].file_path.as_deref(), Some("test.py"));
        assert_eq!(result.frames[0].line, Some(5));
        assert_eq!(result.frames[0].function_name.as_deref(), Some("divide"));
        assert!(result.frames[0].is_user_code);
    }

    #[test]
    fn test_parse_marks_site_packages_as_library() {
        let parser = PythonParser;
        let stderr = "Traceback (most recent call last):\n  File \"/usr/lib/python3/site-packages/requests/api.py\", line 10, in get\n    raise ConnectionError\nConnectionError: failed";
        let result = parser.parse(stderr);
        assert!(!result.frames[0].is_user_code);
    }

    #[test]
    fn test_parse_failure_on_unrelated_text() {
        let parser = PythonParser;
        let result = parser.parse("not a traceback at all");
        assert!(!result.success);
        assert_eq!(result.raw_error.as_deref(), Some("not a traceback at all"));
    }
}
