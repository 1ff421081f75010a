//! Text shown in a response slot when an exchange does not complete.

pub const CANCEL_NOTICE: &str = "Request canceled.";
pub const CONNECTIVITY_FAILURE: &str =
    "Failed to connect to the API. Please check your connection.";

/// Replacement content for a failed exchange. Rate limits get their own
/// explanation whether or not a delay is known.
pub fn failure(message: &str, code: Option<u16>, retry_after: Option<u64>) -> String {
    if code != Some(429) {
        return format!("Error: {}", message);
    }
    match retry_after {
        Some(secs) => format!(
            "Rate limit exceeded. You've hit the API quota. Please wait {} seconds before trying again.",
            secs
        ),
        None => String::from(
            "Rate limit exceeded. You've hit the API quota. Please wait a moment before trying again.",
        ),
    }
}

/// Partial output followed by the cancel notice.
pub fn cancelled(partial: &str) -> String {
    if partial.is_empty() {
        CANCEL_NOTICE.to_string()
    } else {
        format!("{}\n\n{}", partial, CANCEL_NOTICE)
    }
}
