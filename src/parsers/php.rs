use super::{is_user_code, normalize_function_name, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct PhpParser;

impl LanguageParser for PhpParser {
    fn language_name(&self) -> &'static str {
        "PHP"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        if stderr.contains("Fatal error:") && stderr.contains("Uncaught") {
            return Confidence::High;
        }
        if stack_frame_regex().is_match(stderr.lines().next().unwrap_or("")) {
            return Confidence::High;
        }
        if stderr.contains(".php") || stderr.contains("Fatal error:") {
            return Confidence::Medium;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let fatal = fatal_error_line(stderr);
        let stack_re = stack_frame_regex();

        let mut frames: Vec<StackFrame> = stderr
            .lines()
            .filter_map(|line| stack_re.captures(line))
            .map(|caps| {
                let file_path = caps["file"].to_string();
                let line_no: u32 = caps["line"].parse().unwrap_or(0);
                let function_name = normalize_function_name(&caps["func"]);
                StackFrame {
                    file_path: Some(file_path.clone()),
                    line: Some(line_no),
                    column: None,
                    function_name: Some(function_name),
                    class_name: None,
                    is_user_code: is_user_code(&file_path),
                    snippet: None,
                }
            })
            .collect();

        if frames.is_empty() {
            if let Some((_, _, file, line)) = &fatal {
                frames.push(StackFrame {
                    file_path: Some(file.clone()),
                    line: Some(*line),
                    column: None,
                    function_name: None,
                    class_name: None,
                    is_user_code: is_user_code(file),
                    snippet: None,
                });
            }
        }

        let exception = fatal.map(|(exc_type, msg, _, _)| ExceptionInfo {
            exception_type: exc_type,
            message: msg,
            inner: None,
        });

        if frames.is_empty() && exception.is_none() {
            return ParseResult::failure(stderr.to_string());
        }

        ParseResult::success(exception, frames)
    }
}

fn stack_frame_regex() -> Regex {
    Regex::new(r"^#(\d+)\s+(?P<file>.+)\((?P<line>\d+)\):\s+(?P<func>.+)$").unwrap()
}

/// Returns `(exception_type, message, file, line)` from the fatal-error
/// header, accepting both the `in file:line` and `in file on line N`
/// location forms.
fn fatal_error_line(stderr: &str) -> Option<(String, String, String, u32)> {
    let with_colon = Regex::new(
        r"Fatal error:\s*(?:Uncaught\s+)?(?P<type>[\w\\]+):\s*(?P<msg>.*?)\s+in\s+(?P<file>.+?):(?P<line>\d+)\s*$",
    )
    .unwrap();
    let with_on_line = Regex::new(
        r"Fatal error:\s*(?:Uncaught\s+)?(?P<type>[\w\\]+):\s*(?P<msg>.*?)\s+in\s+(?P<file>.+?)\s+on line\s+(?P<line>\d+)\s*$",
    )
    .unwrap();

    stderr.lines().find_map(|line| {
        with_colon
            .captures(line)
            .or_else(|| with_on_line.captures(line))
            .map(|caps| {
                (
                    caps["type"].to_string(),
                    caps["msg"].to_string(),
                    caps["file"].to_string(),
                    caps["line"].parse().unwrap_or(0),
                )
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_STACK: &str = "PHP Fatal error:  Uncaught DivisionByZeroError: Division by zero in /var/www/test.php:3\nStack trace:\n#0 /var/www/test.php(7): divide(1, 0)\n#1 {main}\n  thrown in /var/www/test.php on line 3";

    const WITHOUT_STACK: &str = "PHP Fatal error:  Uncaught Error: Call to undefined function foo() in /var/www/test.php on line 5";

    #[test]
    fn test_can_parse_high_on_uncaught() {
        let parser = PhpParser;
        assert_eq!(parser.can_parse(WITH_STACK), Confidence::High);
    }

    #[test]
    fn test_parse_extracts_stack_trace_frame() {
        let parser = PhpParser;
        let result = parser.parse(WITH_STACK);
        assert!(result.success);
        let exc = result.exception.unwrap();
        assert_eq!(exc.exception_type, "DivisionByZeroError");
        assert_eq!(result.frames[0].function_name.as_deref(), Some("divide"));
        assert_eq!(result.frames[0].line, Some(7));
    }

    #[test]
    fn test_parse_synthesizes_frame_when_no_stack_trace() {
        let parser = PhpParser;
        let result = parser.parse(WITHOUT_STACK);
        assert!(result.success);
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.frames[0].file_path.as_deref(), Some("/var/www/test.php"));
        assert_eq!(result.frames[0].line, Some(5));
        assert!(result.frames[0].function_name.is_none());
    }
}
