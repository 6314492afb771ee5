use super::{is_user_code, normalize_function_name, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct DotNetParser;

impl LanguageParser for DotNetParser {
    fn language_name(&self) -> &'static str {
        "C#"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        let with_location = frame_regex();
        if stderr.lines().any(|l| with_location.is_match(l) && l.contains(" in ")) {
            return Confidence::High;
        }
        if stderr.lines().any(|l| with_location.is_match(l)) {
            return Confidence::Medium;
        }
        if stderr.contains(".cs") || stderr.contains("Exception:") {
            return Confidence::Low;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let re = frame_regex();
        let mut frames = Vec::new();
        for line in stderr.lines() {
            if let Some(caps) = re.captures(line) {
                let qualified = caps["func"].to_string();
                let class_name = qualified.rsplit_once('.').map(|(c, _)| c.to_string());
                let function_name = normalize_function_name(&qualified);
                let file_path = caps.name("file").map(|m| m.as_str().trim().to_string());
                let line_no: Option<u32> = caps.name("line").and_then(|m| m.as_str().parse().ok());
                let is_user = is_user_code(&qualified)
                    && file_path.as_deref().map(is_user_code).unwrap_or(true);
                frames.push(StackFrame {
                    file_path,
                    line: line_no,
                    column: None,
                    function_name: Some(function_name),
                    class_name,
                    is_user_code: is_user,
                    snippet: None,
                });
            }
        }

        let exception = first_exception_line(stderr);

        if frames.is_empty() && exception.is_none() {
            return ParseResult::failure(stderr.to_string());
        }

        ParseResult::success(exception, frames)
    }
}

fn frame_regex() -> Regex {
    Regex::new(r"^\s*at\s+(?P<func>[\w.<>`]+)\([^)]*\)(?:\s+in\s+(?P<file>.+?):line\s+(?P<line>\d+))?\s*$")
        .unwrap()
}

fn first_exception_line(stderr: &str) -> Option<ExceptionInfo> {
    let re = Regex::new(r"^([\w.]+(?:Exception))(?::\s*(.*))?$").unwrap();
    stderr.lines().find_map(|line| {
        re.captures(line.trim()).map(|caps| ExceptionInfo {
            exception_type: caps[1].to_string(),
            message: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            inner: None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "System.DivideByZeroException: Attempted to divide by zero.\n   at MyApp.Program.Divide(Int32 a, Int32 b) in /src/Program.cs:line 10\n   at MyApp.Program.Main(String[] args) in /src/Program.cs:line 5";

    #[test]
    fn test_can_parse_high_with_file_location() {
        let parser = DotNetParser;
        assert_eq!(parser.can_parse(SAMPLE), Confidence::High);
    }

    #[test]
    fn test_parse_extracts_frames_and_exception() {
        let parser = DotNetParser;
        let result = parser.parse(SAMPLE);
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "System.DivideByZeroException");
        assert_eq!(result.frames.len(), 2);
        assert_eq!(result.frames[0].function_name.as_deref(), Some("Divide"));
        assert_eq!(result.frames[0].class_name.as_deref(), Some("MyApp.Program"));
        assert_eq!(result.frames[0].line, Some(10));
    }

    #[test]
    fn test_parse_marks_system_namespace_as_library() {
        let parser = DotNetParser;
        let stderr = "System.NullReferenceException: Object reference not set\n   at System.Collections.Generic.List`1.get_Item(Int32 index) in /src/corelib.cs:line 1";
        let result = parser.parse(stderr);
        assert!(!result.frames[0].is_user_code);
    }
}
