use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Social networks the orchestrator knows how to canonicalize.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SocialPlatform {
    Linkedin,
    Twitter,
    Facebook,
    Instagram,
    Github,
    Youtube,
    Tiktok,
}

/// A profile found in the payload, before and after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfile {
    pub platform: SocialPlatform,
    pub raw_url: String,
    /// Set once the validation step has canonicalized the URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl SocialProfile {
    pub fn is_normalized(&self) -> bool {
        self.normalized_url.is_some()
    }
}
