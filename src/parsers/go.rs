use super::{is_user_code, Confidence, LanguageParser};
use crate::model::{ExceptionInfo, ParseResult, StackFrame};
use regex::Regex;

pub struct GoParser;

impl LanguageParser for GoParser {
    fn language_name(&self) -> &'static str {
        "Go"
    }

    fn can_parse(&self, stderr: &str) -> Confidence {
        if stderr.contains("panic:") {
            return Confidence::High;
        }
        let goroutine_re = Regex::new(r"^goroutine \d+ \[[^\]]+\]:$").unwrap();
        if stderr.lines().any(|l| goroutine_re.is_match(l.trim())) {
            return Confidence::High;
        }
        if stderr.contains(".go:") {
            return Confidence::Medium;
        }
        Confidence::None
    }

    fn parse(&self, stderr: &str) -> ParseResult {
        let func_re = Regex::new(r"^([\w./]+\.[\w]+)\(.*\)$").unwrap();
        let loc_re = Regex::new(r"^\s+(\S+\.go):(\d+)(?:\s+\+0x[0-9a-f]+)?\s*$").unwrap();

        let lines: Vec<&str> = stderr.lines().collect();
        let mut frames = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if let Some(func_caps) = func_re.captures(lines[i].trim()) {
                if i + 1 < lines.len() {
                    if let Some(loc_caps) = loc_re.captures(lines[i + 1]) {
                        let qualified = func_caps[1].to_string();
                        let function_name = qualified
                            .rsplit('.')
                            .next()
                            .unwrap_or(&qualified)
                            .to_string();
                        let file_path = loc_caps[1].to_string();
                        let line_no: u32 = loc_caps[2].parse().unwrap_or(0);
                        let is_user = is_user_code(&qualified) && is_user_code(&file_path);
                        frames.push(StackFrame {
                            file_path: Some(file_path),
                            line: Some(line_no),
                            column: None,
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

        let exception = panic_line(stderr);

        if frames.is_empty() && exception.is_none() {
            return ParseResult::failure(stderr.to_string());
        }

        ParseResult::success(exception, frames)
    }
}

fn panic_line(stderr: &str) -> Option<ExceptionInfo> {
    stderr.lines().find_map(|line| {
        line.trim().strip_prefix("panic:").map(|rest| ExceptionInfo {
            exception_type: "panic".to_string(),
            message: rest.trim().to_string(),
            inner: None,
        })
    })
}
