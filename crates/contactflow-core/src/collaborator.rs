//! Collaborator seams consumed by the workflow.
//!
//! The permanent contact store, its uniqueness index and the reference-data
//! service live outside this subsystem. They are reached only through these
//! traits.

use crate::contact::{ContactPayload, SocialPlatform, SocialProfile};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Answer of a business id lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniquenessCheck {
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_contact_id: Option<String>,
}

impl UniquenessCheck {
    pub fn unique() -> Self {
        Self {
            unique: true,
            existing_contact_id: None,
        }
    }

    pub fn taken_by(contact_id: impl Into<String>) -> Self {
        Self {
            unique: false,
            existing_contact_id: Some(contact_id.into()),
        }
    }
}

#[async_trait]
pub trait UniquenessChecker: Send + Sync {
    async fn check(&self, candidate_business_id: &str) -> Result<UniquenessCheck>;
}

/// What the workflow hands to the permanent store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub account_id: String,
    pub business_id: String,
    pub payload: ContactPayload,
    pub social_profiles: BTreeMap<SocialPlatform, SocialProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedContact {
    pub contact_id: String,
    pub business_id: String,
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, record: ContactRecord) -> Result<CreatedContact>;

    async fn set_primary(&self, account_id: &str, contact_id: &str) -> Result<()>;
}

/// Read-only reference data. Synchronous by contract.
pub trait EnumLookup: Send + Sync {
    fn is_valid(&self, category: &str, value: &str) -> bool;

    fn values(&self, category: &str) -> Vec<String>;
}

pub const CONTACT_TYPE: &str = "contact_type";
pub const INDUSTRY: &str = "industry";
