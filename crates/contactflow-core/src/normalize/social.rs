//! Social-media URL canonicalization.

use crate::contact::{ContactPayload, SocialPlatform, SocialProfile};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

static TWITTER_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").unwrap());
static INSTAGRAM_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").unwrap());
static GITHUB_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,38})$").unwrap());
static FACEBOOK_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.]{5,50}$").unwrap());
static TIKTOK_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._]{2,24}$").unwrap());
static GENERIC_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%-]{2,100}$").unwrap());

const TWITTER_RESERVED: &[&str] = &["home", "intent", "share", "i", "search", "explore", "hashtag"];
const FACEBOOK_RESERVED: &[&str] = &["sharer", "share.php", "groups", "events", "pages", "watch"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),
    #[error("'{url}' is not a {platform} URL")]
    WrongPlatform { platform: SocialPlatform, url: String },
    #[error("no {platform} profile found in '{url}'")]
    NoProfile { platform: SocialPlatform, url: String },
}

/// Profiles recognized in a payload, plus links that matched no platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedProfiles {
    pub profiles: BTreeMap<SocialPlatform, SocialProfile>,
    pub unrecognized: Vec<String>,
    /// Additional links for a platform that already had one.
    pub duplicates: Vec<String>,
}

fn parse_loose(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    url.host_str().filter(|h| h.contains('.'))?;
    Some(url)
}

/// Whether `raw` parses as an http(s) URL, scheme optional.
pub fn is_valid_link(raw: &str) -> bool {
    parse_loose(raw).is_some()
}

fn bare_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    for prefix in ["www.", "m.", "mobile.", "mbasic."] {
        if let Some(rest) = host.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    host
}

fn platform_for_host(host: &str) -> Option<SocialPlatform> {
    let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));
    if matches("linkedin.com") {
        Some(SocialPlatform::Linkedin)
    } else if matches("twitter.com") || matches("x.com") {
        Some(SocialPlatform::Twitter)
    } else if matches("facebook.com") || matches("fb.com") {
        Some(SocialPlatform::Facebook)
    } else if matches("instagram.com") {
        Some(SocialPlatform::Instagram)
    } else if matches("github.com") {
        Some(SocialPlatform::Github)
    } else if matches("youtube.com") {
        Some(SocialPlatform::Youtube)
    } else if matches("tiktok.com") {
        Some(SocialPlatform::Tiktok)
    } else {
        None
    }
}

/// Identifies the platform a URL belongs to.
pub fn detect_platform(raw: &str) -> Option<SocialPlatform> {
    let url = parse_loose(raw)?;
    platform_for_host(&bare_host(&url))
}

fn segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn profile(platform: SocialPlatform, raw: &str, normalized: String, handle: &str) -> SocialProfile {
    SocialProfile {
        platform,
        raw_url: raw.to_string(),
        normalized_url: Some(normalized),
        handle: Some(handle.to_string()),
    }
}

/// Canonicalizes a profile URL (or a bare `@handle`) for `platform`.
pub fn normalize_profile(platform: SocialPlatform, raw: &str) -> Result<SocialProfile, NormalizeError> {
    let trimmed = raw.trim();
    let no_profile = || NormalizeError::NoProfile {
        platform,
        url: raw.to_string(),
    };

    if let Some(handle) = trimmed.strip_prefix('@') {
        let (pattern, base) = match platform {
            SocialPlatform::Twitter => (&*TWITTER_HANDLE, "https://twitter.com/"),
            SocialPlatform::Instagram => (&*INSTAGRAM_HANDLE, "https://www.instagram.com/"),
            SocialPlatform::Github => (&*GITHUB_HANDLE, "https://github.com/"),
            SocialPlatform::Tiktok => (&*TIKTOK_HANDLE, "https://www.tiktok.com/@"),
            _ => return Err(no_profile()),
        };
        if !pattern.is_match(handle) {
            return Err(no_profile());
        }
        let handle = handle.to_ascii_lowercase();
        return Ok(profile(platform, raw, format!("{}{}", base, handle), &handle));
    }

    let url = parse_loose(trimmed).ok_or_else(|| NormalizeError::InvalidUrl(raw.to_string()))?;
    if platform_for_host(&bare_host(&url)) != Some(platform) {
        return Err(NormalizeError::WrongPlatform {
            platform,
            url: raw.to_string(),
        });
    }
    let segs = segments(&url);
    let first = segs.first().map(String::as_str).ok_or_else(no_profile)?;

    match platform {
        SocialPlatform::Linkedin => {
            let kind = match first {
                "in" => "in",
                "company" => "company",
                "school" => "school",
                _ => return Err(no_profile()),
            };
            let slug = segs.get(1).filter(|s| GENERIC_SLUG.is_match(s)).ok_or_else(no_profile)?;
            let slug = slug.to_ascii_lowercase();
            Ok(profile(
                platform,
                raw,
                format!("https://www.linkedin.com/{}/{}", kind, slug),
                &slug,
            ))
        }
        SocialPlatform::Twitter => {
            if TWITTER_RESERVED.contains(&first) || !TWITTER_HANDLE.is_match(first) {
                return Err(no_profile());
            }
            let handle = first.to_ascii_lowercase();
            Ok(profile(platform, raw, format!("https://twitter.com/{}", handle), &handle))
        }
        SocialPlatform::Facebook => {
            if first == "profile.php" {
                let id = url
                    .query_pairs()
                    .find(|(k, _)| k == "id")
                    .map(|(_, v)| v.into_owned())
                    .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
                    .ok_or_else(no_profile)?;
                return Ok(profile(
                    platform,
                    raw,
                    format!("https://www.facebook.com/profile.php?id={}", id),
                    &id,
                ));
            }
            if FACEBOOK_RESERVED.contains(&first) || !FACEBOOK_HANDLE.is_match(first) {
                return Err(no_profile());
            }
            let handle = first.to_ascii_lowercase();
            Ok(profile(platform, raw, format!("https://www.facebook.com/{}", handle), &handle))
        }
        SocialPlatform::Instagram => {
            if !INSTAGRAM_HANDLE.is_match(first) || matches!(first, "p" | "reel" | "explore") {
                return Err(no_profile());
            }
            let handle = first.to_ascii_lowercase();
            Ok(profile(platform, raw, format!("https://www.instagram.com/{}", handle), &handle))
        }
        SocialPlatform::Github => {
            if !GITHUB_HANDLE.is_match(first) || matches!(first, "orgs" | "settings" | "topics") {
                return Err(no_profile());
            }
            let handle = first.to_ascii_lowercase();
            Ok(profile(platform, raw, format!("https://github.com/{}", handle), &handle))
        }
        SocialPlatform::Youtube => {
            if let Some(handle) = first.strip_prefix('@') {
                if !GENERIC_SLUG.is_match(handle) {
                    return Err(no_profile());
                }
                let handle = handle.to_ascii_lowercase();
                return Ok(profile(platform, raw, format!("https://www.youtube.com/@{}", handle), &handle));
            }
            match first {
                "channel" | "c" | "user" => {
                    let id = segs.get(1).filter(|s| GENERIC_SLUG.is_match(s)).ok_or_else(no_profile)?;
                    Ok(profile(
                        platform,
                        raw,
                        format!("https://www.youtube.com/{}/{}", first, id),
                        id,
                    ))
                }
                _ => Err(no_profile()),
            }
        }
        SocialPlatform::Tiktok => {
            let handle = first
                .strip_prefix('@')
                .filter(|h| TIKTOK_HANDLE.is_match(h))
                .ok_or_else(no_profile)?
                .to_ascii_lowercase();
            Ok(profile(platform, raw, format!("https://www.tiktok.com/@{}", handle), &handle))
        }
    }
}

/// Collects recognizable social links from `social_links` and `website`.
///
/// The first link per platform wins. Nothing is normalized here.
pub fn extract_profiles(payload: &ContactPayload) -> ExtractedProfiles {
    let mut extracted = ExtractedProfiles::default();

    let candidates = payload
        .social_links
        .iter()
        .map(|s| (s.as_str(), true))
        .chain(payload.website.as_deref().map(|w| (w, false)));

    for (raw, explicit) in candidates {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match detect_platform(raw) {
            Some(platform) => {
                if extracted.profiles.contains_key(&platform) {
                    extracted.duplicates.push(raw.to_string());
                } else {
                    extracted.profiles.insert(
                        platform,
                        SocialProfile {
                            platform,
                            raw_url: raw.to_string(),
                            normalized_url: None,
                            handle: None,
                        },
                    );
                }
            }
            // A plain company website is not a social link.
            None if explicit => extracted.unrecognized.push(raw.to_string()),
            None => {}
        }
    }

    extracted
}
