/// First `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Collapse newlines to spaces and trim surrounding whitespace.
pub fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

/// Join non-empty items with `", "`, or return `fallback` when none remain.
pub fn join_or<S: AsRef<str>>(items: &[S], fallback: &str) -> String {
    let joined = items
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

/// Round to three decimals for display.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("ăîșțâ", 2), "ăî");
    }

    #[test]
    fn single_line_flattens() {
        assert_eq!(single_line("  a\nb\r\nc  "), "a b  c");
    }

    #[test]
    fn join_or_uses_fallback() {
        assert_eq!(join_or(&["a", "", "b"], "none"), "a, b");
        assert_eq!(join_or::<&str>(&[], "none"), "none");
        assert_eq!(join_or(&[""], "none"), "none");
    }

    #[test]
    fn round3_keeps_three_decimals() {
        assert_eq!(round3(0.12345), 0.123);
        assert_eq!(round3(0.8556), 0.856);
        assert_eq!(round3(1.0), 1.0);
    }
}
