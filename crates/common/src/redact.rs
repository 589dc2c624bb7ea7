//! Sanitizing of HTTP error bodies before they reach logs or error messages.
//!
//! Remote services sometimes echo request headers or webhook URLs back in
//! error payloads. Bodies are scrubbed of tokens and truncated.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length for error body in error messages.
pub const MAX_ERROR_BODY_LEN: usize = 256;

/// Regex pattern for `Token: <value>` style API token headers.
#[allow(clippy::expect_used)] // Literal pattern, verified by tests
static TOKEN_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)token[\x22']?\s*[:=]\s*[\x22']?[A-Za-z0-9_\-]{8,}")
        .expect("token header pattern is valid")
});

/// Regex pattern for Slack incoming webhook URLs.
#[allow(clippy::expect_used)] // Literal pattern, verified by tests
static WEBHOOK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://hooks\.slack\.com/services/[A-Za-z0-9/_\-]+")
        .expect("webhook pattern is valid")
});

/// Sanitize an error response body.
///
/// - Removes API token assignments
/// - Removes Slack webhook URLs
/// - Truncates long bodies to `MAX_ERROR_BODY_LEN` bytes (on a char boundary)
#[must_use]
pub fn sanitize_error_body(body: &str) -> String {
    let sanitized = TOKEN_HEADER_PATTERN.replace_all(body, "[TOKEN_REDACTED]");
    let sanitized = WEBHOOK_PATTERN.replace_all(&sanitized, "[WEBHOOK_REDACTED]");

    if sanitized.len() > MAX_ERROR_BODY_LEN {
        let mut end = MAX_ERROR_BODY_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        let head = sanitized.get(..end).unwrap_or_default();
        format!("{head}...[truncated]")
    } else {
        sanitized.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitizes_token_assignments() {
        let body = r#"{"error": "bad request", "token": "a1b2c3d4e5f6g7h8"}"#;
        let sanitized = sanitize_error_body(body);

        assert!(!sanitized.contains("a1b2c3d4e5f6g7h8"));
        assert!(sanitized.contains("[TOKEN_REDACTED]"));
        assert!(sanitized.contains("bad request"));
    }

    #[test]
    fn test_sanitizes_webhook_urls() {
        let body = "invalid_payload for https://hooks.slack.com/services/T000/B000/XXXX";
        let sanitized = sanitize_error_body(body);

        assert!(!sanitized.contains("T000/B000"));
        assert!(sanitized.contains("[WEBHOOK_REDACTED]"));
    }

    #[test]
    fn test_truncates_long_bodies() {
        let sanitized = sanitize_error_body(&"a".repeat(500));

        assert!(sanitized.ends_with("...[truncated]"));
        assert!(sanitized.len() <= MAX_ERROR_BODY_LEN + 15);
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let sanitized = sanitize_error_body(&"é".repeat(300));
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_preserves_short_safe_messages() {
        let body = r#"{"status": false, "errorMessage": "Project not found"}"#;
        assert_eq!(sanitize_error_body(body), body);
    }
}
