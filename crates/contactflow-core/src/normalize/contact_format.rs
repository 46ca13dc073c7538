//! Email and phone format checks.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .unwrap()
});

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() <= 254
        && EMAIL.is_match(email)
        && !email.contains("..")
        && email
            .rsplit_once('.')
            .is_some_and(|(_, tld)| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Reduces a phone number to `+digits` (or bare digits), or `None` if it is not one.
///
/// Accepts spaces, dots, dashes, parentheses and an optional leading `+`;
/// the result must hold 7 to 15 digits.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let trimmed = phone.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }
    if !(7..=15).contains(&digits.len()) {
        return None;
    }
    Some(if plus { format!("+{}", digits) } else { digits })
}

pub fn is_valid_phone(phone: &str) -> bool {
    normalize_phone(phone).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails() {
        assert!(is_valid_email("john.doe@example.com"));
        assert!(is_valid_email("first+tag@sub.example.co.uk"));
        assert!(!is_valid_email("john.doe@"));
        assert!(!is_valid_email("john..doe@example.com"));
        assert!(!is_valid_email("john@localhost"));
        assert!(!is_valid_email("john doe@example.com"));
    }

    #[test]
    fn test_phones() {
        assert_eq!(normalize_phone("+1 (555) 010-0199").as_deref(), Some("+15550100199"));
        assert_eq!(normalize_phone("030 1234567").as_deref(), Some("0301234567"));
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("555-CALL-NOW"), None);
    }
}
