//! Shared utilities for storage implementations

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current unix timestamp in milliseconds
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Title for a new conversation: the first 50 characters of the opening
/// message, with `...` appended when it was cut.
pub fn conversation_title(message: &str) -> String {
    const MAX_TITLE_CHARS: usize = 50;
    let message = message.trim();
    if message.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = message.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", truncated)
    } else {
        message.to_string()
    }
}
