use super::{is_user_code, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct NodeParser;

impl LanguageParser for NodeParser {
    fn language_name(&self) -> &'static str {
        "JavaScript"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        let frame_re = frame_regex();
        if stderr.lines().any(|l| frame_re.is_match(l)) {
            return Confidence::High;
        }
        if stderr.contains(".js") || stderr.contains("node:internal") {
            return Confidence::Medium;
        }
        if stderr.contains("Error:") {
            return Confidence::Low;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let frame_re = frame_regex();
        let mut frames = Vec::new();
        for line in stderr.lines() {
            if let Some(caps) = frame_re.captures(line) {
                let function_name = caps.name("func").map(|m| m.as_str().to_string());
                let file_path = caps["file"].to_string();
                let line_no: u32 = caps["line"].parse().unwrap_or(0);
                let col: u32 = caps["col"].parse().unwrap_or(0);
                let is_user = is_user_code(&file_path) && !file_path.starts_with("node:");
                frames.push(StackFrame {
                    file_path: Some(file_path),
                    line: Some(line_no),
                    column: Some(col),
                    function_name,
                    class_name: None,
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
    Regex::new(r"^\s*at\s+(?:(?P<func>[^\s(]+)\s+\()?(?P<file>[^()]+?):(?P<line>\d+):(?P<col>\d+)\)?\s*$")
        .unwrap()
}

fn first_exception_line(stderr: &str) -> Option<ExceptionInfo> {
    let re = Regex::new(r"^([A-Za-z_][\w]*(?:Error|Exception))(?::\s*(.*))?$").unwrap();
    stderr.lines().find_map(|line| {
        re.captures(line.trim()).map(|caps| ExceptionInfo {
            exception_type: caps[1].to_string(),
            message: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            inner: None,
        })
    })
}
