//! Business identifier rules.
//!
//! A business id is the user-facing handle of a contact (`john.doe.2024`),
//! distinct from the internal record id.

use crate::contact::ContactPayload;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

static BUSINESS_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{2,63}$").unwrap());

pub fn is_valid(business_id: &str) -> bool {
    BUSINESS_ID.is_match(business_id)
}

/// Lower-cases and trims a caller-supplied id.
pub fn canonicalize(business_id: &str) -> String {
    business_id.trim().to_ascii_lowercase()
}

fn slug(part: &str) -> String {
    let mut out = String::new();
    for c in part.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '.') && !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// `first.last` from the contact's name, if that yields a valid id.
pub fn base_from_name(payload: &ContactPayload) -> Option<String> {
    let parts: Vec<String> = [payload.first_name.as_deref(), payload.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(slug)
        .filter(|s| !s.is_empty())
        .collect();
    let base = parts.join(".");
    is_valid(&base).then_some(base)
}

/// The id a session starts validation with: the explicit one, else `first.last`.
pub fn candidate_from_payload(payload: &ContactPayload) -> Option<String> {
    match payload.business_id.as_deref() {
        Some(explicit) if !explicit.trim().is_empty() => Some(canonicalize(explicit)),
        _ => base_from_name(payload),
    }
}

/// `base-n`, truncating `base` so the result stays within the length limit.
pub fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{}", n);
    let keep = 64usize.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", &base[..keep], suffix)
}

/// Generates a fresh id: name slug (or `contact`) plus four random digits.
pub fn generate(payload: &ContactPayload) -> String {
    let base = base_from_name(payload).unwrap_or_else(|| "contact".to_string());
    let n: u32 = rand::thread_rng().gen_range(1000..10000);
    let tail = format!(".{}", n);
    let keep = 64usize.saturating_sub(tail.len()).min(base.len());
    format!("{}{}", &base[..keep], tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(first: &str, last: &str) -> ContactPayload {
        ContactPayload {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_format() {
        assert!(is_valid("john.doe.2024"));
        assert!(is_valid("acme_support-1"));
        assert!(!is_valid("JD"));
        assert!(!is_valid("-leading"));
        assert!(!is_valid("has space"));
    }

    #[test]
    fn test_candidate_prefers_explicit() {
        let mut payload = named("John", "Doe");
        assert_eq!(candidate_from_payload(&payload).as_deref(), Some("john.doe"));
        payload.business_id = Some(" John.Doe.2024 ".into());
        assert_eq!(candidate_from_payload(&payload).as_deref(), Some("john.doe.2024"));
    }

    #[test]
    fn test_name_slug() {
        assert_eq!(
            base_from_name(&named("Mary Ann", "O'Neil")).as_deref(),
            Some("mary-ann.oneil")
        );
        assert_eq!(base_from_name(&ContactPayload::default()), None);
    }

    #[test]
    fn test_suffix_stays_in_bounds() {
        assert_eq!(with_suffix("john.doe", 2), "john.doe-2");
        let long = "a".repeat(64);
        let suffixed = with_suffix(&long, 12);
        assert_eq!(suffixed.len(), 64);
        assert!(is_valid(&suffixed));
    }

    #[test]
    fn test_generate() {
        let id = generate(&named("Ada", "Lovelace"));
        assert!(id.starts_with("ada.lovelace."));
        assert!(is_valid(&id));
        assert!(generate(&ContactPayload::default()).starts_with("contact."));
    }
}
