//! Token stripping and boundary extraction.

use crate::error::{NormalizeError, NormalizeResult};

/// End-of-turn markers emitted by Llama-3 style chat templates.
pub const CONTROL_TOKENS: &[&str] = &["<|eot_id|>", "<|eom_id|>", "<|end_of_text|>", "<|im_end|>"];

/// Remove known control tokens and surrounding whitespace.
pub fn strip_control_tokens(text: &str) -> String {
    let mut cleaned = text.to_string();
    for token in CONTROL_TOKENS {
        if cleaned.contains(token) {
            cleaned = cleaned.replace(token, "");
        }
    }
    cleaned.trim().to_string()
}

/// The span from the first `{` to the last `}`, inclusive.
///
/// When the text opens with `[` and the brackets enclose that span, the
/// whole array is returned instead so the caller can unwrap it.
pub fn extract_json_candidate(text: &str) -> NormalizeResult<&str> {
    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => return Err(NormalizeError::NoJsonObjectFound),
    };

    if let (Some(open), Some(close)) = (text.find('['), text.rfind(']')) {
        if open < start && close > end && text[..open].trim().is_empty() {
            return Ok(&text[open..=close]);
        }
    }

    Ok(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tokens() {
        assert_eq!(
            strip_control_tokens("  {\"a\": 1}<|eot_id|>\n"),
            "{\"a\": 1}"
        );
        assert_eq!(strip_control_tokens("<|eom_id|>x<|eot_id|>"), "x");
    }

    #[test]
    fn test_extract_ignores_prose() {
        let text = "Sure! Here it is: {\"message\": \"ok\"} Hope that helps.";
        assert_eq!(extract_json_candidate(text).unwrap(), "{\"message\": \"ok\"}");
    }

    #[test]
    fn test_extract_spans_outermost_braces() {
        let text = "```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_candidate(text).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_extract_keeps_leading_array() {
        let text = "[{\"message\": \"m\"}]\n";
        assert_eq!(extract_json_candidate(text).unwrap(), "[{\"message\": \"m\"}]");

        let text = "See [1]: {\"message\": \"m\"}";
        assert_eq!(extract_json_candidate(text).unwrap(), "{\"message\": \"m\"}");
    }

    #[test]
    fn test_extract_missing_delimiters() {
        assert_eq!(
            extract_json_candidate("no json here"),
            Err(NormalizeError::NoJsonObjectFound)
        );
        assert_eq!(
            extract_json_candidate("only { opening"),
            Err(NormalizeError::NoJsonObjectFound)
        );
        assert_eq!(
            extract_json_candidate("} reversed {"),
            Err(NormalizeError::NoJsonObjectFound)
        );
    }
}
