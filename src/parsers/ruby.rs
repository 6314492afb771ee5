use super::{is_user_code, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct RubyParser;

impl LanguageParser for RubyParser {
    fn language_name(&self) -> &'static str {
        "Ruby"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        if head_regex().is_match(stderr.lines().next().unwrap_or("")) {
            return Confidence::High;
        }
        if stderr.lines().any(|l| from_regex().is_match(l.trim())) {
            return Confidence::High;
        }
        if stderr.contains(".rb") {
            return Confidence::Medium;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let mut lines = stderr.lines();
        let mut frames = Vec::new();
        let mut exception = None;

        if let Some(first) = lines.next() {
            if let Some(caps) = head_regex().captures(first) {
                let file_path = caps["file"].to_string();
                let line_no: u32 = caps["line"].parse().unwrap_or(0);
                let function_name = caps["func"].to_string();
                exception = Some(ExceptionInfo {
                    exception_type: caps["type"].to_string(),
                    message: caps["msg"].trim().to_string(),
                    inner: None,
                });
                frames.push(StackFrame {
                    file_path: Some(file_path.clone()),
                    line: Some(line_no),
                    column: None,
                    function_name: Some(function_name),
                    class_name: None,
                    is_user_code: is_user_code(&file_path),
                    snippet: None,
                });
            }
        }

        for line in stderr.lines() {
            if let Some(caps) = from_regex().captures(line.trim()) {
                let file_path = caps["file"].to_string();
                let line_no: u32 = caps["line"].parse().unwrap_or(0);
                let function_name = caps["func"].to_string();
                frames.push(StackFrame {
                    file_path: Some(file_path.clone()),
                    line: Some(line_no),
                    column: None,
                    function_name: Some(function_name),
                    class_name: None,
                    is_user_code: is_user_code(&file_path),
                    snippet: None,
                });
            }
        }

        if frames.is_empty() && exception.is_none() {
            return ParseResult::failure(stderr.to_string());
        }

        ParseResult::success(exception, frames)
    }
}

fn head_regex() -> Regex {
    Regex::new(r"^(?P<file>.+):(?P<line>\d+):in `(?P<func>[^']+)':\s*(?P<msg>.*?)\s*\((?P<type>[\w:]+)\)\s*$").unwrap()
}

fn from_regex() -> Regex {
    Regex::new(r"^from\s+(?P<file>.+):(?P<line>\d+):in `(?P<func>[^']+)'\s*$").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "test.rb:2:in `divide': divided by 0 (ZeroDivisionError)\n\tfrom test.rb:5:in `<main>'";

    #[test]
    fn test_can_parse_high() {
        let parser = RubyParser;
        assert_eq!(parser.can_parse(SAMPLE), Confidence::High);
    }

    #[test]
    fn test_parse_extracts_frames_and_exception() {
        let parser = RubyParser;
        let result = parser.parse(SAMPLE);
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "ZeroDivisionError");
        assert_eq!(exc.message, "divided by 0");
        assert_eq!(result.frames.len(), 2);
        assert_eq!(result.frames[0].function_name.as_deref(), Some("divide"));
        assert_eq!(result.frames[1].function_name.as_deref(), Some("<main>"));
    }

    #[test]
    fn test_parse_marks_gems_as_library() {
        let parser = RubyParser;
        let stderr = "/app/vendor/bundle/gems/rack-2.2/lib/rack.rb:10:in `call': boom (RuntimeError)";
        let result = parser.parse(stderr);
        assert!(!result.frames[0].is_user_code);
    }
}
