//! Minimal shell-style glob matching (`*` and `?`) for `ls`/`rm`/`stat`
//! filters, matching the fnmatch semantics the original front end used.

pub fn matches(pattern: &str, name: &str) -> bool {
    matches_from(pattern.as_bytes(), name.as_bytes())
}

fn matches_from(pattern: &[u8], name: &[u8]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some(b'*') => {
            matches_from(&pattern[1..], name) || (!name.is_empty() && matches_from(pattern, &name[1..]))
        }
        Some(b'?') => !name.is_empty() && matches_from(&pattern[1..], &name[1..]),
        Some(&c) => !name.is_empty() && name[0] == c && matches_from(&pattern[1..], &name[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        assert!(matches("*.txt", "notes.txt"));
        assert!(!matches("*.txt", "notes.md"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
    }

    #[test]
    fn literal_pattern_requires_exact_match() {
        assert!(matches("readme", "readme"));
        assert!(!matches("readme", "readme2"));
    }
}
