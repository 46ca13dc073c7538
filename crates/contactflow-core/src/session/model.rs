//! Session domain model.
//!
//! A session is the transient record of one contact's way through
//! staging, validation and persistence. It lives only in the session store
//! and expires with its TTL.

use super::state::{IllegalTransition, NextStep, WorkflowEvent, WorkflowState, WorkflowStep};
use crate::contact::{ContactPayload, SocialPlatform, SocialProfile};
use crate::error::{FlowError, Result};
use crate::validation::ValidationOutcome;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SESSION_ID_PREFIX: &str = "sess_contact_";

/// One line of the validation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub step: WorkflowStep,
    /// The event that was applied, or a free-form marker such as `extended`.
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Durable identifiers returned by the permanent store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedContact {
    pub contact_id: String,
    pub business_id: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub state: WorkflowState,
    pub payload: ContactPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default)]
    pub business_id_generated: bool,
    #[serde(default)]
    pub social_profiles: BTreeMap<SocialPlatform, SocialProfile>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validation: Option<ValidationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistedContact>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub total_extensions: u32,
    pub ttl_secs: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// `sess_contact_<unix millis>_<9 random lowercase alphanumerics>`.
pub fn new_session_id(now: DateTime<Utc>) -> String {
    format!("{}{}_{}", SESSION_ID_PREFIX, now.timestamp_millis(), random_suffix(9))
}

pub(crate) fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

impl Session {
    pub fn new(
        account_id: impl Into<String>,
        payload: ContactPayload,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: new_session_id(now),
            account_id: account_id.into(),
            batch_id: None,
            state: WorkflowState::Staged,
            payload,
            business_id: None,
            business_id_generated: false,
            social_profiles: BTreeMap::new(),
            history: Vec::new(),
            last_validation: None,
            persisted: None,
            retry_count: 0,
            total_extensions: 0,
            ttl_secs,
            created_at: now,
            last_updated_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
            persisted_at: None,
            completed_at: None,
        }
    }

    pub fn step(&self) -> WorkflowStep {
        self.state.step()
    }

    pub fn next_step(&self) -> NextStep {
        self.state.next_step()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Stamps `last_updated_at` and re-derives `expires_at` from it.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_at = now;
        self.expires_at = now + Duration::seconds(self.ttl_secs as i64);
    }

    /// Replaces the TTL and re-stamps the session.
    pub fn reset_ttl(&mut self, ttl_secs: u64, now: DateTime<Utc>) {
        self.ttl_secs = ttl_secs;
        self.touch(now);
    }

    /// Adds time to the current expiry without moving `last_updated_at`,
    /// so `expires_at` grows by exactly `additional_secs`.
    pub fn extend(&mut self, additional_secs: u64, now: DateTime<Utc>) {
        self.ttl_secs += additional_secs;
        self.expires_at = self.last_updated_at + Duration::seconds(self.ttl_secs as i64);
        self.total_extensions += 1;
        self.record(
            "extended",
            Some(format!("+{}s (extension #{})", additional_secs, self.total_extensions)),
            now,
        );
    }

    /// Seconds left before the store should drop the key (at least one).
    pub fn remaining_ttl_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }

    pub fn record(&mut self, outcome: &str, detail: Option<String>, now: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            step: self.state.step(),
            outcome: outcome.to_string(),
            timestamp: now,
            detail,
        });
    }

    /// Applies `event` through the transition function, records it and
    /// re-stamps the session. Does not count retries; see [`Session::consume_retry`].
    pub fn apply(&mut self, event: WorkflowEvent, detail: Option<String>, now: DateTime<Utc>) -> Result<()> {
        let next = self.state.transition(event).map_err(|IllegalTransition { from, event }| {
            FlowError::invalid_state(self.session_id.clone(), from, event.to_string())
        })?;
        self.state = next;
        self.record(&event.to_string(), detail, now);
        self.touch(now);
        Ok(())
    }

    /// Counts one retry if `event` is a retry from the current state.
    ///
    /// Returns `false` when the retry budget is already spent; the caller is
    /// then expected to fail the session.
    pub fn consume_retry(&mut self, event: WorkflowEvent, max_retries: u32) -> bool {
        if !self.state.is_retry(event) {
            return true;
        }
        if self.retry_count >= max_retries {
            return false;
        }
        self.retry_count += 1;
        true
    }

    /// Drops the current business id, leaving a trace in the history.
    pub fn clear_business_id(&mut self, reason: &str, now: DateTime<Utc>) -> Option<String> {
        let previous = self.business_id.take();
        if let Some(ref id) = previous {
            self.business_id_generated = false;
            self.record(
                "business_id_cleared",
                Some(format!("{} ({})", id, reason)),
                now,
            );
        }
        previous
    }

    /// Assigns a business id. Refuses to overwrite a different one silently.
    pub fn assign_business_id(&mut self, id: String, generated: bool, now: DateTime<Utc>) -> Result<()> {
        match self.business_id.as_deref() {
            Some(current) if current != id => {
                return Err(FlowError::conflict(
                    self.session_id.clone(),
                    format!(
                        "business id '{}' is already assigned; clear it before assigning '{}'",
                        current, id
                    ),
                ));
            }
            Some(_) => return Ok(()),
            None => {}
        }
        self.record("business_id_assigned", Some(id.clone()), now);
        self.business_id = Some(id);
        self.business_id_generated = generated;
        Ok(())
    }

    /// Normalized profile count, as used by analytics.
    pub fn normalized_profile_count(&self) -> usize {
        self.social_profiles.values().filter(|p| p.is_normalized()).count()
    }
}
