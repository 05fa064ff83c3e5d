//! Text normalization for the Requirement Interpreter.
//!
//! - prompt text is lower-cased and whitespace-collapsed before keyword tests
//! - service responses lose one Markdown code fence before JSON parsing

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Multiple whitespace pattern
    static ref MULTI_SPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Opening fence, with or without the `json` label
    static ref LEADING_FENCE: Regex = Regex::new(r"^```(?:json)?").unwrap();

    /// Closing fence
    static ref TRAILING_FENCE: Regex = Regex::new(r"```$").unwrap();
}

/// Normalize a user prompt for keyword matching
pub fn normalize(text: &str) -> String {
    MULTI_SPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

/// Strip exactly one leading and one trailing code fence, then trim.
pub fn strip_code_fence(text: &str) -> String {
    let text = text.trim();
    let text = LEADING_FENCE.replace(text, "");
    let text = TRAILING_FENCE.replace(&text, "");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Modern   LIVING room\n"), "modern living room");
        assert_eq!(normalize("客廳動線不順暢"), "客廳動線不順暢");
    }

    #[test]
    fn test_strip_labelled_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_code_fence("```\n{}\n```  "), "{}");
    }

    #[test]
    fn test_unfenced_passthrough() {
        assert_eq!(strip_code_fence("  {\"b\": 2} "), "{\"b\": 2}");
    }

    #[test]
    fn test_only_one_fence_removed() {
        assert_eq!(strip_code_fence("``````"), "");
        assert_eq!(strip_code_fence("```json\n```{}```\n```"), "```{}```");
    }
}
