//! Text size policy shared by tool results, logs, and display.

/// Maximum number of characters any single text payload may carry.
pub const MAX_TEXT_CHARS: usize = 4000;

/// Appended to a payload that was cut at the limit.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed.
///
/// Counts `char`s, so a multi-byte sequence is never split.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// [`truncate_text`] at [`MAX_TEXT_CHARS`].
pub fn truncate(text: &str) -> String {
    truncate_text(text, MAX_TEXT_CHARS)
}

/// Prefix host-origin metadata onto `text` and apply the size policy.
pub fn annotate(annotation: Option<&str>, text: &str) -> String {
    match annotation {
        Some(system) => truncate(&format!("<system>{system}</system>\n{text}")),
        None => truncate(text),
    }
}
