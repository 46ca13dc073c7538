//! Communication preference summary.
//!
//! Derived from which fields of a contact are populated; never stored.

use super::payload::ContactPayload;
use super::social::SocialProfile;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Channels in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommunicationChannel {
    Email,
    Phone,
    Website,
    Social,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationPreference {
    pub preferred_channel: CommunicationChannel,
    /// Every populated channel, highest priority first.
    pub available_channels: Vec<CommunicationChannel>,
}

pub fn summarize<'a>(
    payload: &ContactPayload,
    profiles: impl IntoIterator<Item = &'a SocialProfile>,
) -> CommunicationPreference {
    let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

    let mut available = Vec::new();
    if filled(&payload.email) {
        available.push(CommunicationChannel::Email);
    }
    if filled(&payload.phone) {
        available.push(CommunicationChannel::Phone);
    }
    if filled(&payload.website) {
        available.push(CommunicationChannel::Website);
    }
    if profiles.into_iter().next().is_some() {
        available.push(CommunicationChannel::Social);
    }

    CommunicationPreference {
        preferred_channel: available
            .first()
            .copied()
            .unwrap_or(CommunicationChannel::None),
        available_channels: available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::SocialPlatform;

    #[test]
    fn test_email_beats_phone() {
        let payload = ContactPayload {
            email: Some("a@b.io".into()),
            phone: Some("+15550100".into()),
            ..Default::default()
        };
        let pref = summarize(&payload, Vec::<&SocialProfile>::new());
        assert_eq!(pref.preferred_channel, CommunicationChannel::Email);
        assert_eq!(
            pref.available_channels,
            vec![CommunicationChannel::Email, CommunicationChannel::Phone]
        );
    }

    #[test]
    fn test_social_only() {
        let profile = SocialProfile {
            platform: SocialPlatform::Github,
            raw_url: "https://github.com/ada".into(),
            normalized_url: None,
            handle: None,
        };
        let pref = summarize(&ContactPayload::default(), [&profile]);
        assert_eq!(pref.preferred_channel, CommunicationChannel::Social);
    }

    #[test]
    fn test_nothing_populated() {
        let pref = summarize(&ContactPayload::default(), Vec::<&SocialProfile>::new());
        assert_eq!(pref.preferred_channel, CommunicationChannel::None);
        assert!(pref.available_channels.is_empty());
    }
}
