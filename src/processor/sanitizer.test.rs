//! Unit tests for secret redaction

use super::patterns::{PatternError, PatternSpec};
use super::sanitizer::*;
use crate::history::Entry;

fn sanitizer() -> Sanitizer {
    Sanitizer::new().unwrap()
}

fn assert_sanitized(cases: &[(&str, &str)]) {
    let sanitizer = sanitizer();
    for (input, expected) in cases {
        assert_eq!(&sanitizer.sanitize_text(input), expected, "input: {input}");
    }
}



#[cfg(test)]
mod builder_tests {
    use super::*;

    fn spec(name: &str, matcher: &str) -> PatternSpec {
        PatternSpec {
            name: name.to_string(),
            matcher: matcher.to_string(),
            replacement: "<REDACTED>".to_string(),
            full_remove: false,
        }
    }

    #[test]
    fn test_custom_patterns_run_after_defaults() {
        let sanitizer = Sanitizer::builder()
            .patterns([spec("internal-token", r"itk_[a-z0-9]{16}")])
            .build()
            .unwrap();

        assert_eq!(sanitizer.sanitize_text("deploy itk_0123456789abcdef"), "deploy <REDACTED>");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Sanitizer::builder()
            .patterns([spec("private-key", "x")])
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::DuplicateName(ref name) if name == "private-key"));
    }

    #[test]
    fn test_invalid_custom_matcher_fails_construction() {
        let err = Sanitizer::builder()
            .patterns([spec("broken", "(unclosed")])
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::InvalidMatcher { .. }));
    }

    #[test]
    fn test_empty_builder_has_no_rules() {
        let sanitizer = SanitizerBuilder::default().build().unwrap();
        assert_eq!(sanitizer.sanitize_text("export API_KEY=abc"), "export API_KEY=abc");
    }
}
