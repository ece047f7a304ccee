/// Find the largest valid UTF-8 boundary at or before the given byte index.
#[inline]
fn safe_byte_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    s.char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_bytes)
        .last()
        .unwrap_or(0)
}

/// Truncate a string with a marker if it exceeds the maximum byte length,
/// respecting UTF-8 character boundaries.
#[inline]
pub fn truncate_with_marker(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = safe_byte_boundary(s, max_len);
        format!("{}...[truncated]", &s[..boundary])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_string_untouched() {
        assert_eq!(truncate_with_marker("short", 100), "short");
    }

    #[test]
    fn test_truncation_respects_utf8_boundary() {
        let s = "héllo wörld";
        let truncated = truncate_with_marker(s, 3);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(s.starts_with(truncated.trim_end_matches("...[truncated]")));
    }
}
