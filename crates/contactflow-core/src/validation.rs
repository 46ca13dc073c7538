//! Validation value objects and the structural (staging) checks.

use crate::contact::ContactPayload;
use crate::normalize::{business_id, social, ProfessionalAnalysis};
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 100;
const MAX_FIELD_LEN: usize = 255;
const MAX_NOTES_LEN: usize = 5000;
const MAX_SOCIAL_LINKS: usize = 20;

/// Structured result of one validation pass. Not persisted on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub business_id_unique: bool,
    pub social_normalized: bool,
    pub email_valid: bool,
    pub phone_valid: bool,
    /// Names of the rules that ran, in order.
    pub applied_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional: Option<ProfessionalAnalysis>,
    /// Non-blocking findings.
    pub warnings: Vec<String>,
    /// Blocking findings.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_blocked(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn rule(&mut self, name: &str) {
        self.applied_rules.push(name.to_string());
    }
}

/// Findings of the format-only staging pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StructuralReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn too_long(field: &str, value: &Option<String>, max: usize, report: &mut StructuralReport) {
    if let Some(v) = value {
        if v.chars().count() > max {
            report
                .errors
                .push(format!("{} exceeds {} characters", field, max));
        }
    }
}

/// Format-only checks run at staging. No uniqueness, no reference data.
pub fn check_structure(payload: &ContactPayload) -> StructuralReport {
    let mut report = StructuralReport::default();
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

    if !present(&payload.first_name) && !present(&payload.last_name) && !present(&payload.company) {
        report
            .errors
            .push("a first name, last name or company is required".to_string());
    }

    too_long("firstName", &payload.first_name, MAX_NAME_LEN, &mut report);
    too_long("lastName", &payload.last_name, MAX_NAME_LEN, &mut report);
    too_long("company", &payload.company, MAX_FIELD_LEN, &mut report);
    too_long("jobTitle", &payload.job_title, MAX_FIELD_LEN, &mut report);
    too_long("email", &payload.email, 254, &mut report);
    too_long("website", &payload.website, MAX_FIELD_LEN, &mut report);
    too_long("notes", &payload.notes, MAX_NOTES_LEN, &mut report);

    if let Some(id) = payload.business_id.as_deref().filter(|s| !s.trim().is_empty()) {
        if !business_id::is_valid(&business_id::canonicalize(id)) {
            report.errors.push(format!(
                "businessId '{}' must be 3-64 characters of a-z, 0-9, '.', '_' or '-'",
                id
            ));
        }
    }

    if let Some(website) = payload.website.as_deref().filter(|s| !s.trim().is_empty()) {
        if !social::is_valid_link(website) {
            report.errors.push(format!("website '{}' is not a valid URL", website));
        }
    }

    if payload.social_links.len() > MAX_SOCIAL_LINKS {
        report
            .errors
            .push(format!("at most {} social links are allowed", MAX_SOCIAL_LINKS));
    }
    for link in &payload.social_links {
        if !social::is_valid_link(link) && !link.trim().starts_with('@') {
            report
                .errors
                .push(format!("social link '{}' is not a valid URL", link));
        }
    }

    if !present(&payload.email) && !present(&payload.phone) {
        report
            .warnings
            .push("no email or phone; the contact will be hard to reach".to_string());
    }

    report
}
