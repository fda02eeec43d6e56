//! Text Helpers
//!
//! Preview truncation, required-field checks, and list normalization shared by
//! every entity kind.

use crate::error::{CoreError, CoreResult};

/// Marker appended to truncated previews
pub const ELLIPSIS: &str = "...";

/// Truncate `text` to at most `max_chars` characters, appending an ellipsis
/// when anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Reject a required text field that is empty or whitespace only.
pub fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        Err(CoreError::missing_field(field))
    } else {
        Ok(())
    }
}

/// Trim every entry and drop the empty ones, keeping order.
pub fn normalize_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Normalize a list and remove duplicates, keeping the first occurrence.
pub fn normalize_set<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    normalize_list(items)
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Split a comma-separated string into a normalized list.
pub fn split_csv(raw: &str) -> Vec<String> {
    normalize_list(raw.split(','))
}

/// Case-insensitive substring test. `needle_lower` must already be lowercase.
pub fn contains_folded(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
