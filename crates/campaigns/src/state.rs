//! Per-user campaign display history and session counters. Every mutation
//! is persisted synchronously; there is no write-behind buffering.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use reach_storage::StorageManager;

use crate::model::{Campaign, CampaignId};

const CAMPAIGN_STATE_KEY: &str = "campaignState.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Unseen,
    Seen,
    Deleted,
}

/// Display history for one campaign id. `impressions` never decreases;
/// `unseen -> seen` happens on first display and is not reverted except by
/// a user switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignState {
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub impressions: u32,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_shown: Option<DateTime<Utc>>,
}

/// Session-wide display counters, reset whenever a new session begins.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_start: DateTime<Utc>,
    pub global_impressions: u32,
    pub global_last_shown: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(session_start: DateTime<Utc>) -> Self {
        Self {
            session_start,
            global_impressions: 0,
            global_last_shown: None,
        }
    }
}

/// Persisted per-user record of campaign display history plus the in-memory
/// session counters. The persisted blob is a JSON map of campaign id to
/// `CampaignState`, stored behind a verified read so a corrupt blob is
/// treated as absent rather than consumed.
pub struct CampaignStateStore {
    user_id: String,
    storage: StorageManager,
    states: HashMap<CampaignId, CampaignState>,
    session: SessionState,
}

impl CampaignStateStore {
    /// Load the persisted state map for `user_id`, starting a new session.
    pub fn load(storage: StorageManager, user_id: &str, session_start: DateTime<Utc>) -> Self {
        let states = storage
            .get_verified(&Self::key(user_id))
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(states) => Some(states),
                Err(e) => {
                    warn!(user_id, error = %e, "discarding unreadable campaign state");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            user_id: user_id.to_string(),
            storage,
            states,
            session: SessionState::new(session_start),
        }
    }

    /// Merge the state map with a freshly loaded campaign list: every new
    /// campaign id gets a fresh `unseen` entry, entries whose id is no
    /// longer sent down are pruned, existing entries are left untouched.
    pub fn sync_with(&mut self, campaigns: &[Campaign]) {
        for campaign in campaigns {
            self.states.entry(campaign.id).or_default();
        }
        let before = self.states.len();
        self.states
            .retain(|id, _| campaigns.iter().any(|c| c.id == *id));
        if self.states.len() < before {
            debug!(
                user_id = %self.user_id,
                pruned = before - self.states.len(),
                "pruned state for withdrawn campaigns"
            );
        }
        self.persist();
    }

    pub fn state(&self, id: CampaignId) -> Option<&CampaignState> {
        self.states.get(&id)
    }

    /// State used during evaluation; ids the server never sent down read as
    /// fresh.
    pub fn state_or_default(&self, id: CampaignId) -> CampaignState {
        self.states.get(&id).cloned().unwrap_or_default()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Record a winning display: bumps the campaign's impressions and the
    /// session counters, marks it seen, persists immediately.
    pub fn record_impression(&mut self, id: CampaignId, now: DateTime<Utc>) {
        let state = self.states.entry(id).or_default();
        state.impressions += 1;
        state.last_shown = Some(now);
        state.status = CampaignStatus::Seen;

        self.session.global_impressions += 1;
        self.session.global_last_shown = Some(now);

        self.persist();
    }

    pub fn mark_seen(&mut self, id: CampaignId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.status = CampaignStatus::Seen;
            self.persist();
        }
    }

    pub fn mark_deleted(&mut self, id: CampaignId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.status = CampaignStatus::Deleted;
            self.persist();
        }
    }

    fn persist(&self) {
        match serde_json::to_string(&self.states) {
            Ok(blob) => self.storage.save_verified(&Self::key(&self.user_id), &blob),
            Err(e) => warn!(user_id = %self.user_id, error = %e, "failed to serialize campaign state"),
        }
    }

    fn key(user_id: &str) -> String {
        format!("{CAMPAIGN_STATE_KEY}{user_id}")
    }
}
