use super::{is_user_code, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct SwiftParser;

const HEADERS: &[(&str, &str)] = &[
    ("Fatal error", "FatalError"),
    ("Precondition failed", "PreconditionFailure"),
    ("Assertion failed", "AssertionFailure"),
];

impl LanguageParser for SwiftParser {
    fn language_name(&self) -> &'static str {
        "Swift"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        if location_line(stderr).is_some() {
            return Confidence::High;
        }
        if stderr.contains(".swift") {
            return Confidence::Medium;
        }
        if HEADERS.iter().any(|(h, _)| stderr.contains(h)) {
            return Confidence::Low;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        match location_line(stderr) {
            Some((exception_type, message, file_path, line)) => {
                let frame = StackFrame {
                    file_path: Some(file_path.clone()),
                    line: Some(line),
                    column: None,
                    function_name: None,
                    class_name: None,
                    is_user_code: is_user_code(&file_path),
                    snippet: None,
                };
                ParseResult::success(
                    Some(ExceptionInfo {
                        exception_type,
                        message,
                        inner: None,
                    }),
                    vec![frame],
                )
            }
            None => ParseResult::failure(stderr.to_string()),
        }
    }
}

fn location_line(stderr: &str) -> Option<(String, String, String, u32)> {
    for (header, exception_type) in HEADERS {
        let pattern = format!(
            r"^{}:\s*(?P<msg>.*?):\s*file\s+(?P<file>\S+),\s*line\s+(?P<line>\d+)\s*$",
            regex::escape(header)
        );
        let re = Regex::new(&pattern).unwrap();
        if let Some(caps) = stderr.lines().find_map(|line| re.captures(line.trim())) {
            return Some((
                exception_type.to_string(),
                caps["msg"].to_string(),
                caps["file"].to_string(),
                caps["line"].parse().unwrap_or(0),
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_parse_high_on_fatal_error_with_location() {
        let parser = SwiftParser;
        assert_eq!(
            parser.can_parse("Fatal error: Division by zero: file test.swift, line 3"),
            Confidence::High
        );
    }

    #[test]
    fn test_parse_synthesizes_frame() {
        let parser = SwiftParser;
        let result = parser.parse("Fatal error: Division by zero: file test.swift, line 3");
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "FatalError");
        assert_eq!(exc.message, "Division by zero");
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.frames[0].file_path.as_deref(), Some("test.swift"));
        assert_eq!(result.frames[0].line, Some(3));
    }

    #[test]
    fn test_parse_precondition_failed() {
        let parser = SwiftParser;
        let result =
            parser.parse("Precondition failed: index out of range: file Array.swift, line 100");
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "PreconditionFailure");
    }

    #[test]
    fn test_parse_failure_on_unrelated_text() {
        let parser = SwiftParser;
        let result = parser.parse("segmentation fault");
        assert!(!result.success);
    }
}
