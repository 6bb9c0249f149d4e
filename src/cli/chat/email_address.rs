use regex::Regex;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Checks the `local@domain.tld` shape. No whitespace, exactly one `@`.
pub fn is_valid_email(candidate: &str) -> bool {
    Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(candidate))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("frodo.baggins@bolson.shire.me"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for candidate in ["not-an-email", "a@b", "@b.com", "a@.com", "a b@c.com", "a@b@c.com", ""] {
            assert!(!is_valid_email(candidate), "{} should be rejected", candidate);
        }
    }
}
