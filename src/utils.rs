/// Shared utility functions

/// Shorten to at most `max_chars` characters, marking the cut with an ellipsis
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Pad or shorten to exactly `width` characters
pub fn fit_width(s: &str, width: usize) -> String {
    let shortened = ellipsize(s, width);
    let len = shortened.chars().count();
    format!("{}{}", shortened, " ".repeat(width.saturating_sub(len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("Shampoo", 10), "Shampoo");
        assert_eq!(ellipsize("Shampoo", 7), "Shampoo");
        assert_eq!(ellipsize("Shampoo & Conditioner", 8), "Shampoo…");
    }

    #[test]
    fn test_ellipsize_utf8() {
        // counts characters, not bytes
        assert_eq!(ellipsize("Çağrı Kategorisi", 6), "Çağrı…");
        assert_eq!(ellipsize("café", 4), "café");
    }

    #[test]
    fn test_fit_width() {
        assert_eq!(fit_width("Bath", 6), "Bath  ");
        assert_eq!(fit_width("Bathroom", 6), "Bathr…");
    }
}
