//! C3 — Parser Registry: ordered dispatch by reported confidence, stable
//! tie-break by registration order. Grounded in `cosmos::index`'s
//! deterministic, ordered dispatch of file-type handlers.

use super::{Confidence, LanguageParser};
use super::{
    dotnet::DotNetParser, go::GoParser, java::JavaParser, node::NodeParser, php::PhpParser,
    python::PythonParser, ruby::RubyParser, rust_lang::RustParser, swift::SwiftParser,
};

pub struct ParserRegistry {
    parsers: Vec<Box<dyn LanguageParser>>,
}

impl ParserRegistry {
    /// Registration order is part of the contract: ties in reported
    /// confidence are broken in favor of whichever parser was registered
    /// first (spec §4.3, §9).
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(PythonParser),
                Box::new(NodeParser),
                Box::new(DotNetParser),
                Box::new(JavaParser),
                Box::new(GoParser),
                Box::new(RustParser),
                Box::new(RubyParser),
                Box::new(PhpParser),
                Box::new(SwiftParser),
            ],
        }
    }

    /// Iterates once, tracking the maximum confidence seen. Returns `None`
    /// if the best tier is `Confidence::None`.
    pub fn best(&self, stderr: &str) -> Option<&dyn LanguageParser> {
        let mut best: Option<(&dyn LanguageParser, Confidence)> = None;
        for parser in &self.parsers {
            let confidence = parser.can_parse(stderr);
            if confidence == Confidence::None {
                continue;
            }
            match &best {
                Some((_, best_confidence)) if confidence <= *best_confidence => {}
                _ => best = Some((parser.as_ref(), confidence)),
            }
        }
        best.map(|(parser, _)| parser)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_selects_python_for_traceback() {
        let registry = ParserRegistry::new();
        let stderr = "Traceback (most recent call last):\n  File \"a.py\", line 1, in <module>\nValueError: bad";
        let parser = registry.best(stderr).unwrap();
        assert_eq!(parser.language_name(), "Python");
    }

    #[test]
    fn test_best_returns_none_for_unrecognized_text() {
        let registry = ParserRegistry::new();
        assert!(registry.best("segmentation fault (core dumped)").is_none());
    }

    #[test]
    fn test_best_breaks_ties_by_registration_order() {
        // Both Node and Rust might report Low confidence on bare mentions
        // of "Error:"; Python is registered first among generic matchers.
        let registry = ParserRegistry::new();
        let stderr = "SomeError: something went wrong";
        // Python's Low tier requires ".py" or "Error:"; it is registered
        // first, so on an ambiguous generic message it wins the tie.
        let parser = registry.best(stderr);
        assert!(parser.is_some());
        assert_eq!(parser.unwrap().language_name(), "Python");
    }
}
