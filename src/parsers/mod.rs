//! C2 — Language Parsers, and the shared capability trait the registry (C3)
//! dispatches against.
//!
//! Each parser is a small, independent "sibling" implementing the same
//! three-method surface, the way `cosmos::suggest::static_rules` keeps its
//! heuristics narrow and selective rather than building one do-everything
//! analyzer.

pub mod dotnet;
pub mod go;
pub mod java;
pub mod node;
pub mod php;
pub mod python;
pub mod registry;
pub mod ruby;
pub mod rust_lang;
pub mod swift;

use crate::model::ParseResult;

/// Confidence tier a parser reports for a chunk of stderr text. Ordered so
/// `Confidence::High > Confidence::None` holds under plain comparison -
/// the registry just tracks the running maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

/// Capability set every language parser implements.
pub trait LanguageParser: Send + Sync {
    fn language_name(&self) -> &'static str;
    fn can_parse(&self, stderr: &str) -> Confidence;
    fn parse(&self, stderr: &str) -> ParseResult;
}

/// Well-known library/runtime path or package prefixes, checked as plain
/// substrings. A stack frame whose file path or qualified name contains one
/// of these is library code, not user code (spec §4.2).
const LIBRARY_PREFIXES: &[&str] = &[
    "site-packages/",
    "node_modules/",
    "/rustc/",
    "/.cargo/",
    "/vendor/",
    "/gems/",
    "java.",
    "javax.",
    "System.",
    "Microsoft.",
    "libswift",
    "/go/src/",
    "/pkg/mod/",
];

/// Shared frame-classification helper: `true` means user code.
pub fn is_user_code(identifier: &str) -> bool {
    !LIBRARY_PREFIXES
        .iter()
        .any(|prefix| identifier.contains(prefix))
}

/// Strips a parameter list (`"foo(int, int)"` -> `"foo"`) and, for dotted
/// forms, retains only the last segment (spec §4.2 normalization).
pub fn normalize_function_name(raw: &str) -> String {
    let without_params = match raw.find('(') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    without_params
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(without_params)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert!(Confidence::Low > Confidence::None);
    }

    #[test]
    fn test_is_user_code_flags_library_paths() {
        assert!(!is_user_code("/usr/lib/python3/site-packages/foo.py"));
        assert!(!is_user_code("/app/node_modules/express/index.js"));
        assert!(!is_user_code("java.lang.String"));
        assert!(is_user_code("/home/user/project/main.py"));
    }

    #[test]
    fn test_normalize_function_name_strips_params_and_dots() {
        assert_eq!(normalize_function_name("com.example.Main.divide(int, int)"), "divide");
        assert_eq!(normalize_function_name("divide"), "divide");
    }
}
