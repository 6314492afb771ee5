use super::{is_user_code, normalize_function_name, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct JavaParser;

impl LanguageParser for JavaParser {
    fn language_name(&self) -> &'static str {
        "Java"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        let re = frame_regex();
        if stderr.lines().any(|l| re.is_match(l)) {
            return Confidence::High;
        }
        if stderr.contains(".java") {
            return Confidence::Medium;
        }
        if stderr.contains("Exception") || stderr.contains("Error") {
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
                let file_name = caps["file"].to_string();
                let line_no: u32 = caps["line"].parse().unwrap_or(0);
                let is_user = is_user_code(&qualified);
                frames.push(StackFrame {
                    file_path: Some(file_name),
                    line: Some(line_no),
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
    Regex::new(r"^\s*at\s+(?P<func>[\w.$]+)\((?P<file>[\w.]+):(?P<line>\d+)\)\s*$").unwrap()
}

fn first_exception_line(stderr: &str) -> Option<ExceptionInfo> {
    let re = Regex::new(r"^([\w.$]+(?:Exception|Error))(?::\s*(.*))?$").unwrap();
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

    const SAMPLE: &str = "java.lang.ArithmeticException: / by zero\n\tat com.example.Main.divide(Main.java:10)\n\tat com.example.Main.main(Main.java:5)";

    #[test]
    fn test_can_parse_high_on_at_frame() {
        let parser = JavaParser;
        assert_eq!(parser.can_parse(SAMPLE), Confidence::High);
    }

    #[test]
    fn test_parse_extracts_frames_and_exception() {
        let parser = JavaParser;
        let result = parser.parse(SAMPLE);
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "java.lang.ArithmeticException");
        assert_eq!(exc.message, "/ by zero");
        assert_eq!(result.frames.len(), 2);
        assert_eq!(result.frames[0].function_name.as_deref(), Some("divide"));
        assert_eq!(result.frames[0].file_path.as_deref(), Some("Main.java"));
        assert!(result.frames[0].is_user_code);
    }

    #[test]
    fn test_parse_marks_java_lang_as_library() {
        let parser = JavaParser;
        let stderr = "java.lang.NullPointerException\n\tat java.lang.String.length(String.java:50)";
        let result = parser.parse(stderr);
        assert!(!result.frames[0].is_user_code);
    }
}
