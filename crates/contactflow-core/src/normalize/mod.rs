//! Normalization engine.
//!
//! Pure functions only: no I/O, no clock, no shared state.
//!
//! - `social`: per-platform URL canonicalization and profile extraction
//! - `professional`: job title / industry classification
//! - `contact_format`: email and phone checks
//! - `business_id`: business identifier format, derivation and suffixing

pub mod business_id;
pub mod contact_format;
pub mod professional;
pub mod social;

pub use professional::{Department, IndustryCategory, JobLevel, ProfessionalAnalysis};
pub use social::{ExtractedProfiles, NormalizeError};
