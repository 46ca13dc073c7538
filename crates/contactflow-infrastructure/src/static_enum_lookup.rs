//! Fixed reference data.

use contactflow_core::collaborator::{EnumLookup, CONTACT_TYPE, INDUSTRY};
use std::collections::HashMap;

const CONTACT_TYPES: &[&str] = &[
    "lead", "prospect", "customer", "partner", "vendor", "investor", "colleague", "personal",
    "other",
];

const INDUSTRIES: &[&str] = &[
    "technology",
    "finance",
    "healthcare",
    "education",
    "manufacturing",
    "retail",
    "media",
    "professional_services",
    "government",
    "non_profit",
    "real_estate",
    "energy",
    "other",
];

fn canonical(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

/// Reference data held in memory; categories can be replaced or added.
#[derive(Debug, Clone)]
pub struct StaticEnumLookup {
    categories: HashMap<String, Vec<String>>,
}

impl StaticEnumLookup {
    pub fn empty() -> Self {
        Self {
            categories: HashMap::new(),
        }
    }

    pub fn with_category<I, S>(mut self, category: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories.insert(
            category.to_string(),
            values.into_iter().map(|v| canonical(v.as_ref())).collect(),
        );
        self
    }
}

impl Default for StaticEnumLookup {
    fn default() -> Self {
        Self::empty()
            .with_category(CONTACT_TYPE, CONTACT_TYPES)
            .with_category(INDUSTRY, INDUSTRIES)
    }
}

impl EnumLookup for StaticEnumLookup {
    fn is_valid(&self, category: &str, value: &str) -> bool {
        let value = canonical(value);
        self.categories
            .get(category)
            .is_some_and(|values| values.contains(&value))
    }

    fn values(&self, category: &str) -> Vec<String> {
        self.categories.get(category).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let lookup = StaticEnumLookup::default();
        assert!(lookup.is_valid(CONTACT_TYPE, "Customer"));
        assert!(lookup.is_valid(INDUSTRY, "Real Estate"));
        assert!(!lookup.is_valid(CONTACT_TYPE, "alien"));
        assert!(!lookup.is_valid("unknown_category", "x"));
        assert_eq!(lookup.values(INDUSTRY).len(), INDUSTRIES.len());
    }

    #[test]
    fn test_override() {
        let lookup = StaticEnumLookup::empty().with_category(CONTACT_TYPE, ["vip"]);
        assert!(lookup.is_valid(CONTACT_TYPE, "VIP"));
        assert!(lookup.values(INDUSTRY).is_empty());
    }
}
