//! Utility functions for Arena services.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Cuts on character boundaries, so multi-byte text is safe.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Shorten a session identifier for logs and debug listings.
pub fn short_id(id: &str) -> String {
    truncate_with_ellipsis(id, 8)
}

/// Sanitize a string for safe logging (redact sensitive patterns).
pub fn sanitize_for_log(s: &str) -> String {
    let patterns: &[(&str, &str)] = &[
        (r"(?i)(api[_-]?key|apikey)[=:]\s*\S{20,}", "$1=***REDACTED***"),
        (r"(?i)(token|secret)\s*[=:]\s*\S{10,}", "$1=***REDACTED***"),
        (r"(?i)bearer\s+\S{10,}", "Bearer ***REDACTED***"),
        (r"sk-or-[a-zA-Z0-9-]{20,}", "***REDACTED_API_KEY***"),
        (r"sk-[a-zA-Z0-9]{20,}", "***REDACTED_API_KEY***"),
    ];

    let mut result = s.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("hello", 10, "hello" ; "short string untouched")]
    #[test_case("hello world", 5, "hello..." ; "ascii truncated")]
    #[test_case("¿qué tal amigo?", 7, "¿qué ta..." ; "multibyte truncated")]
    fn test_truncate_with_ellipsis(input: &str, max: usize, expected: &str) {
        assert_eq!(truncate_with_ellipsis(input, max), expected);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(
            short_id("0b1c2d3e-aaaa-bbbb-cccc-ddddeeeeffff"),
            "0b1c2d3e..."
        );
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_sanitize_api_key() {
        let sanitized = sanitize_for_log("auth failed for sk-or-v1-abcdefghijklmnopqrstuvwxyz");
        assert!(!sanitized.contains("abcdefghijklmnop"));
        assert!(sanitized.contains("REDACTED"));
    }

    #[test]
    fn test_sanitize_leaves_plain_text() {
        assert_eq!(sanitize_for_log("rate limited"), "rate limited");
    }
}
