//! Traffic logging for vendor API calls
//!
//! Events go to the `traffic` tracing target so they can be filtered
//! independently. Content is truncated to avoid leaking private data in logs.

use tracing::{debug, trace, warn};

/// Maximum characters to log for content (to protect privacy)
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

/// Log the start of a streaming call (truncated summary only)
pub fn log_stream_start(model: &str, url: &str, request: &impl serde::Serialize) {
    debug!(target: "traffic", model, url, request = %summarize(request), "stream start");
}

/// Log a decoded vendor event (truncated summary only)
pub fn log_stream_event(model: &str, event: &impl serde::Serialize) {
    trace!(target: "traffic", model, event = %summarize(event), "stream event");
}

/// Log an adapter failure. Cancellations are expected and not logged here.
pub fn log_failure(model: &str, error: &crate::LlmError) {
    if !error.is_cancelled() {
        log_error(model, &error.to_string());
    }
}

pub fn log_error(model: &str, error: &str) {
    warn!(target: "traffic", model, error = %truncate_for_log(error, MAX_CONTENT_LOG_CHARS), "vendor error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate_for_log("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let s = "é".repeat(12);
        let out = truncate_for_log(&s, 10);
        assert!(out.starts_with(&"é".repeat(10)));
        assert!(out.ends_with("(12 chars total)"));
    }
}
