//! Traffic logging for LLM API calls
//!
//! Emitted under the `llm::traffic` target. Content is truncated so prompts
//! and replies do not end up verbatim in log files.

/// Maximum characters to log for content
const MAX_CONTENT_LOG_CHARS: usize = 200;

/// Truncate a string for logging, adding ellipsis if truncated
pub(crate) fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

fn summarize(value: &impl serde::Serialize) -> String {
    let json =
        serde_json::to_string(value).unwrap_or_else(|_| "<serialization error>".to_string());
    truncate_for_log(&json, MAX_CONTENT_LOG_CHARS)
}

pub(crate) fn log_request(model: &str, stream: bool, request: &impl serde::Serialize) {
    tracing::debug!(target: "llm::traffic", model, stream, "request {}", summarize(request));
}

pub(crate) fn log_response(model: &str, response: &impl serde::Serialize) {
    tracing::debug!(target: "llm::traffic", model, "response {}", summarize(response));
}

pub(crate) fn log_error(model: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(target: "llm::traffic", model, "error {}", error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_for_log("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let s = "ééééé";
        assert_eq!(truncate_for_log(s, 5), s);
        assert_eq!(truncate_for_log(s, 2), "éé... (5 chars total)");
    }
}
