/// Truncate `s` to at most `max_chars` Unicode scalar values, returning a
/// sub-slice.
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Keep the first `max_chars` characters and append `"..."` when anything
/// was cut off.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    let head = truncate_str(s, max_chars);
    if head.len() == s.len() {
        s.to_string()
    } else {
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_respects_char_boundaries() {
        assert_eq!(truncate_str("héllo", 2), "hé");
        assert_eq!(truncate_str("abc", 10), "abc");
        assert_eq!(truncate_str("", 3), "");
    }

    #[test]
    fn ellipsis_only_when_cut() {
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
    }
}
