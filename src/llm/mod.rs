pub mod media;
pub mod openai;
pub mod render;

use serde_json::Value;

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls a human-readable message out of an API error body when one exists, plus a
/// truncated copy of the body for the log.
pub(crate) fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_nested_error_message() {
        let (message, _) = summarize_error_body(r#"{"error": {"message": "rate limited"}}"#);
        assert_eq!(message.as_deref(), Some("rate limited"));
    }

    #[test]
    fn handles_non_json_and_empty_bodies() {
        let (message, summary) = summarize_error_body("upstream exploded");
        assert!(message.is_none());
        assert_eq!(summary, "upstream exploded");

        let (message, summary) = summarize_error_body("   ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn truncates_long_values_for_logging() {
        let long = "x".repeat(50);
        let truncated = truncate_for_log(&long, 10);
        assert!(truncated.starts_with("xxxxxxxxxx"));
        assert!(truncated.ends_with("(truncated)"));
        assert_eq!(truncate_for_log("short", 10), "short");
    }
}
