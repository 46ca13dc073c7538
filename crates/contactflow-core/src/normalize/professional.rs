//! Job title and industry classification.

use crate::contact::{ContactPayload, SocialPlatform, SocialProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobLevel {
    Executive,
    Director,
    Manager,
    Senior,
    IndividualContributor,
    Entry,
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Department {
    Engineering,
    Sales,
    Marketing,
    Finance,
    Operations,
    HumanResources,
    Legal,
    Product,
    Design,
    Support,
    Executive,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndustryCategory {
    Technology,
    Finance,
    Healthcare,
    Education,
    Manufacturing,
    Retail,
    Media,
    ProfessionalServices,
    Government,
    NonProfit,
    RealEstate,
    Energy,
    Other,
}

/// Result of the optional professional-networking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalAnalysis {
    pub job_level: JobLevel,
    pub department: Department,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_category: Option<IndustryCategory>,
    pub has_linkedin: bool,
    pub is_business_email: bool,
    /// 0..=100; how complete the professional footprint is.
    pub networking_score: u8,
    pub suggestions: Vec<String>,
}

const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "proton.me",
    "protonmail.com",
    "gmx.com",
    "mail.com",
    "yandex.com",
    "zoho.com",
];

fn has_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|w| words.contains(&w))
}

fn has_phrase(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

pub fn classify_job_level(title: &str) -> JobLevel {
    let t = title.to_ascii_lowercase();
    if t.trim().is_empty() {
        return JobLevel::Unknown;
    }
    if has_word(&t, &["ceo", "cto", "cfo", "coo", "cmo", "cio", "ciso", "founder", "cofounder", "president", "owner", "partner"])
        || has_phrase(&t, &["chief ", "co-founder", "managing director"])
    {
        JobLevel::Executive
    } else if has_word(&t, &["vp", "svp", "evp", "director", "head"]) || has_phrase(&t, &["vice president"]) {
        JobLevel::Director
    } else if has_word(&t, &["manager", "lead", "supervisor", "principal"]) {
        JobLevel::Manager
    } else if has_word(&t, &["senior", "sr", "staff", "architect"]) {
        JobLevel::Senior
    } else if has_word(&t, &["intern", "junior", "jr", "trainee", "apprentice", "graduate", "assistant"]) {
        JobLevel::Entry
    } else {
        JobLevel::IndividualContributor
    }
}

pub fn classify_department(title: &str) -> Department {
    let t = title.to_ascii_lowercase();
    if has_word(&t, &["ceo", "coo", "president", "founder", "cofounder"]) || has_phrase(&t, &["co-founder", "managing director"]) {
        Department::Executive
    } else if has_word(&t, &["engineer", "engineering", "developer", "software", "devops", "cto", "sre", "programmer", "architect", "data"]) {
        Department::Engineering
    } else if has_word(&t, &["sales", "account", "business", "bdr", "sdr"]) {
        Department::Sales
    } else if has_word(&t, &["marketing", "cmo", "growth", "brand", "content", "seo", "communications"]) {
        Department::Marketing
    } else if has_word(&t, &["finance", "cfo", "accountant", "accounting", "controller", "treasurer"]) {
        Department::Finance
    } else if has_word(&t, &["hr", "people", "recruiter", "recruiting", "talent"]) || has_phrase(&t, &["human resources"]) {
        Department::HumanResources
    } else if has_word(&t, &["legal", "counsel", "attorney", "lawyer", "compliance"]) {
        Department::Legal
    } else if has_word(&t, &["product"]) {
        Department::Product
    } else if has_word(&t, &["design", "designer", "ux", "ui"]) {
        Department::Design
    } else if has_word(&t, &["support", "success", "service"]) {
        Department::Support
    } else if has_word(&t, &["operations", "ops", "logistics", "coo"]) {
        Department::Operations
    } else {
        Department::Other
    }
}

pub fn classify_industry(industry: &str) -> IndustryCategory {
    let t = industry.to_ascii_lowercase();
    if has_word(&t, &["software", "technology", "tech", "saas", "it", "internet", "computer", "telecommunications", "ai"]) {
        IndustryCategory::Technology
    } else if has_word(&t, &["finance", "financial", "banking", "bank", "insurance", "investment", "fintech"]) {
        IndustryCategory::Finance
    } else if has_word(&t, &["health", "healthcare", "medical", "hospital", "pharmaceutical", "pharma", "biotech"]) {
        IndustryCategory::Healthcare
    } else if has_word(&t, &["education", "university", "school", "edtech", "learning"]) {
        IndustryCategory::Education
    } else if has_word(&t, &["manufacturing", "industrial", "automotive", "aerospace"]) {
        IndustryCategory::Manufacturing
    } else if has_word(&t, &["retail", "ecommerce", "commerce", "consumer"]) {
        IndustryCategory::Retail
    } else if has_word(&t, &["media", "entertainment", "publishing", "advertising", "news"]) {
        IndustryCategory::Media
    } else if has_word(&t, &["consulting", "legal", "accounting", "services", "agency"]) {
        IndustryCategory::ProfessionalServices
    } else if has_word(&t, &["government", "public", "defense"]) {
        IndustryCategory::Government
    } else if has_word(&t, &["nonprofit", "charity", "ngo"]) || has_phrase(&t, &["non-profit"]) {
        IndustryCategory::NonProfit
    } else if has_phrase(&t, &["real estate", "property"]) {
        IndustryCategory::RealEstate
    } else if has_word(&t, &["energy", "oil", "gas", "utilities", "renewable", "solar"]) {
        IndustryCategory::Energy
    } else {
        IndustryCategory::Other
    }
}

/// True when the address is not on a free-mail provider.
pub fn is_business_email(email: &str) -> bool {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_ascii_lowercase())
        .is_some_and(|domain| !domain.is_empty() && !FREE_MAIL_DOMAINS.contains(&domain.as_str()))
}

/// Classifies the contact and scores its professional footprint.
pub fn analyze(
    payload: &ContactPayload,
    profiles: &BTreeMap<SocialPlatform, SocialProfile>,
) -> ProfessionalAnalysis {
    let title = payload.job_title.as_deref().unwrap_or_default();
    let job_level = classify_job_level(title);
    let department = classify_department(title);
    let industry_category = payload.industry.as_deref().map(classify_industry);
    let has_linkedin = profiles.contains_key(&SocialPlatform::Linkedin);
    let is_business_email = payload.email.as_deref().is_some_and(is_business_email);

    let mut score: u32 = 0;
    let mut suggestions = Vec::new();
    if has_linkedin {
        score += 35;
    } else {
        suggestions.push("Add a LinkedIn profile".to_string());
    }
    if is_business_email {
        score += 25;
    } else if payload.email.is_some() {
        suggestions.push("Prefer a business email address".to_string());
    } else {
        suggestions.push("Add an email address".to_string());
    }
    if job_level != JobLevel::Unknown {
        score += 15;
    } else {
        suggestions.push("Add a job title".to_string());
    }
    if payload.company.as_deref().is_some_and(|c| !c.trim().is_empty()) {
        score += 15;
    } else {
        suggestions.push("Add a company name".to_string());
    }
    if industry_category.is_some() {
        score += 10;
    } else {
        suggestions.push("Add an industry".to_string());
    }

    ProfessionalAnalysis {
        job_level,
        department,
        industry_category,
        has_linkedin,
        is_business_email,
        networking_score: score.min(100) as u8,
        suggestions,
    }
}
