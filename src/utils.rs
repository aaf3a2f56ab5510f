use std::borrow::Cow;

/// Truncate a string to at most `max_bytes` bytes without splitting a multi-byte
/// character. Returns the input unchanged if it already fits.
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Short form of a label for log lines: truncated with a trailing `...`.
pub fn preview(s: &str, max_bytes: usize) -> Cow<'_, str> {
    let cut = safe_truncate(s, max_bytes);
    if cut.len() == s.len() {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("{}...", cut))
    }
}
