//! Truncation Utilities
//!
//! Character-count truncation that always cuts on a UTF-8 boundary.

use std::borrow::Cow;

/// Keep at most `max_chars` characters of `content`.
///
/// Borrows when nothing needs to be cut.
pub fn truncate_chars(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(content[..cut].to_string()),
        None => Cow::Borrowed(content),
    }
}

/// Like [`truncate_chars`] but marks the cut with an ellipsis, for log previews.
pub fn preview(content: &str, max_chars: usize) -> String {
    match truncate_chars(content, max_chars) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(mut s) => {
            s.push('…');
            s
        }
    }
}
