//! End-to-end trigger evaluation: match candidates, apply rules and the
//! asset gate, pick at most one winner by priority, record the display, and
//! hand the winning payload to the host.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use reach_core::events::SESSION_START_TRIGGER;
use reach_core::{Clock, ReachResult, SdkConfig};
use reach_storage::StorageManager;

use crate::assets::{collect_assets, AssetGate};
use crate::conditions::EventPayload;
use crate::model::{
    Campaign, CampaignBatch, CampaignId, CampaignKind, CampaignResourceResponse, CampaignRules,
    CdnPaths, EmbeddedMessage, Message,
};
use crate::qa::{QaCampaignReport, QaLogger, QaTriggerReport};
use crate::rules::{describe, RuleEvaluator, Verdict};
use crate::state::{CampaignState, CampaignStateStore, CampaignStatus, SessionState};
use crate::triggers::TriggerIndex;

const CAMPAIGNS_KEY: &str = "campaigns.";

pub type PersonalizationProperties = HashMap<String, String>;

/// Receives the winning in-app message: `(message, parent campaign, images CDN)`.
pub type MessageListener = Box<dyn Fn(&Message, &Campaign, &str) + Send + Sync>;
/// Receives the winning embedded payload and the personalization properties.
pub type EmbeddedListener = Box<dyn Fn(&EmbeddedMessage, &PersonalizationProperties) + Send + Sync>;
/// Notified for every recorded display, whatever the campaign kind.
pub type ImpressionHandler = Box<dyn Fn(&Campaign) + Send + Sync>;

/// Verdict plus human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub verdict: Verdict,
    pub message: String,
}

/// Evaluation record for one candidate, kept for every candidate whatever
/// the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub id: CampaignId,
    pub kind: CampaignKind,
    pub verdict: Verdict,
    pub displayed: bool,
    pub reason: String,
}

/// Result of one `check_triggers` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerOutcome {
    /// Overall result of the call.
    pub global_status: StatusReport,
    /// Result for the decisive candidate; `None` when no trigger matched by
    /// name.
    pub campaign_status: Option<StatusReport>,
    pub campaigns: Vec<CandidateReport>,
}

impl TriggerOutcome {
    pub fn code(&self) -> Verdict {
        self.global_status.verdict
    }

    pub fn displayed(&self) -> bool {
        self.campaigns.iter().any(|c| c.displayed)
    }

    /// Id of the displayed campaign, if any.
    pub fn winner(&self) -> Option<CampaignId> {
        self.campaigns.iter().find(|c| c.displayed).map(|c| c.id)
    }
}

/// The targeting and admission-control engine for one user context.
///
/// Holds no ambient globals: storage, clock, and asset gate are injected,
/// and all evaluation runs synchronously on the caller's thread. Callers
/// serialize access through `&mut self`.
pub struct CampaignEngine {
    user_id: String,
    storage: StorageManager,
    clock: Arc<dyn Clock>,
    assets: Arc<dyn AssetGate>,
    campaigns: Vec<Campaign>,
    global_rules: CampaignRules,
    cdn: CdnPaths,
    triggers: TriggerIndex,
    state: CampaignStateStore,
    qa: QaLogger,
    message_listener: Option<MessageListener>,
    embedded_listener: Option<EmbeddedListener>,
    impression_handler: Option<ImpressionHandler>,
}

impl CampaignEngine {
    /// Build an engine for `user_id`, restoring any campaign list and
    /// display state persisted for that user in a previous session. The
    /// session clock starts now.
    pub fn new(
        user_id: &str,
        config: &SdkConfig,
        storage: StorageManager,
        assets: Arc<dyn AssetGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session_start = clock.now();
        let state = CampaignStateStore::load(storage.clone(), user_id, session_start);

        let mut engine = Self {
            user_id: user_id.to_string(),
            storage,
            clock,
            assets,
            campaigns: Vec::new(),
            global_rules: CampaignRules::default(),
            cdn: CdnPaths::default(),
            triggers: TriggerIndex::default(),
            state,
            qa: QaLogger::new(config.qa.enabled, config.qa.max_buffered_reports),
            message_listener: None,
            embedded_listener: None,
            impression_handler: None,
        };
        engine.restore_campaigns();
        engine
    }

    /// Ingest a freshly downloaded campaign payload: persist it, merge the
    /// per-campaign state map, rebuild the trigger index. Returns the asset
    /// names the downloader still has to fetch into the gate.
    pub fn store_campaigns(&mut self, response: CampaignResourceResponse) -> Vec<String> {
        let batch = response.campaigns;
        info!(
            user_id = %self.user_id,
            campaigns = batch.campaigns.len(),
            "storing campaign payload"
        );

        match serde_json::to_string(&batch) {
            Ok(blob) => self.storage.save_data(&self.campaigns_key(), &blob),
            Err(e) => warn!(error = %e, "failed to serialize campaign payload"),
        }

        self.global_rules = batch.rules;
        self.cdn = batch.cdn_paths;
        self.campaigns = batch.campaigns;
        self.triggers = TriggerIndex::rebuild(&self.campaigns);
        self.state.sync_with(&self.campaigns);

        collect_assets(&self.campaigns)
    }

    /// Parse and ingest a raw response body; a malformed payload is
    /// rejected whole, leaving the engine untouched.
    pub fn store_campaigns_json(&mut self, raw: &str) -> ReachResult<Vec<String>> {
        let response = CampaignResourceResponse::from_json(raw)?;
        Ok(self.store_campaigns(response))
    }

    /// Evaluate one fired event against the loaded campaigns. At most one
    /// campaign is displayed per call; every candidate is reported.
    pub fn check_triggers(
        &mut self,
        event_name: &str,
        payload: Option<&EventPayload>,
        personalization: Option<&PersonalizationProperties>,
    ) -> TriggerOutcome {
        let now = self.clock.now();
        let matched = self.triggers.matching_campaigns(event_name, payload);

        if matched.is_empty() {
            debug!(event_name, "no campaigns with matching triggers");
            let outcome = TriggerOutcome {
                global_status: StatusReport {
                    verdict: Verdict::NoMatch,
                    message: format!("no campaign triggers matched event {event_name}"),
                },
                campaign_status: None,
                campaigns: Vec::new(),
            };
            self.record_qa(event_name, payload, &outcome);
            return outcome;
        }

        // Candidates in priority order, declaration order on ties.
        let mut candidates: Vec<usize> = matched
            .iter()
            .filter_map(|id| self.campaigns.iter().position(|c| c.id == *id))
            .collect();
        candidates.sort_by_key(|&idx| self.campaigns[idx].priority);

        let evaluator = RuleEvaluator::new(&self.global_rules);
        let mut verdicts: Vec<Verdict> = Vec::with_capacity(candidates.len());
        for &idx in &candidates {
            let campaign = &self.campaigns[idx];
            let state = self.state.state_or_default(campaign.id);
            let mut verdict = evaluator.evaluate(campaign, &state, self.state.session(), now);

            if verdict.is_match() && !self.displayable(campaign) {
                verdict = Verdict::NotDownloaded;
            }
            debug!(
                campaign_id = campaign.id,
                priority = campaign.priority,
                verdict = ?verdict,
                "candidate evaluated"
            );
            verdicts.push(verdict);
        }

        let winner = verdicts.iter().position(|v| v.is_match());

        let mut reports = Vec::with_capacity(candidates.len());
        for (pos, &idx) in candidates.iter().enumerate() {
            let campaign = &self.campaigns[idx];
            let displayed = winner == Some(pos);
            let verdict = match verdicts[pos] {
                Verdict::Match if !displayed => Verdict::EligibleButOtherChosen,
                v => v,
            };
            reports.push(CandidateReport {
                id: campaign.id,
                kind: campaign.kind(),
                verdict,
                displayed,
                reason: describe(verdict, campaign),
            });
        }

        let decisive = winner.unwrap_or(0);
        let campaign_status = StatusReport {
            verdict: reports[decisive].verdict,
            message: reports[decisive].reason.clone(),
        };
        let global_status = match winner {
            Some(pos) => {
                let id = self.campaigns[candidates[pos]].id;
                StatusReport {
                    verdict: Verdict::Match,
                    message: format!("campaign {id} displayed for event {event_name}"),
                }
            }
            None => campaign_status.clone(),
        };

        let outcome = TriggerOutcome {
            global_status,
            campaign_status: Some(campaign_status),
            campaigns: reports,
        };

        if let Some(pos) = winner {
            let idx = candidates[pos];
            let id = self.campaigns[idx].id;
            info!(
                campaign_id = id,
                event_name,
                priority = self.campaigns[idx].priority,
                "campaign selected for display"
            );
            self.state.record_impression(id, now);
            self.dispatch(idx, personalization);
        }

        self.record_qa(event_name, payload, &outcome);
        outcome
    }

    /// Fire the reserved session-start trigger.
    pub fn check_session_start_triggers(
        &mut self,
        personalization: Option<&PersonalizationProperties>,
    ) -> TriggerOutcome {
        self.check_triggers(SESSION_START_TRIGGER, None, personalization)
    }

    // ------------------------------------------------------------------
    // Message center
    // ------------------------------------------------------------------

    /// Message-center campaigns the host may list right now: flagged for
    /// the center, inside their active window, not deleted, assets ready.
    /// Throttle rules do not apply to the center.
    pub fn message_center_campaigns(&self) -> Vec<&Campaign> {
        let now = self.clock.now();
        self.campaigns
            .iter()
            .filter(|c| {
                c.message_center
                    && c.is_active(now)
                    && self.state.state_or_default(c.id).status != CampaignStatus::Deleted
                    && self.assets.check_assets_for_campaign(c)
            })
            .collect()
    }

    /// Show a campaign on explicit host request (message center), without
    /// rule evaluation. The display is still recorded.
    pub fn show_campaign(
        &mut self,
        id: CampaignId,
        personalization: Option<&PersonalizationProperties>,
    ) -> bool {
        let Some(idx) = self.campaigns.iter().position(|c| c.id == id) else {
            warn!(campaign_id = id, "show_campaign: unknown campaign");
            return false;
        };
        if !self.displayable(&self.campaigns[idx]) {
            warn!(campaign_id = id, "show_campaign: nothing to display");
            return false;
        }

        let now = self.clock.now();
        self.state.record_impression(id, now);
        self.dispatch(idx, personalization);
        true
    }

    pub fn mark_campaign_seen(&mut self, id: CampaignId) {
        self.state.mark_seen(id);
    }

    pub fn mark_campaign_deleted(&mut self, id: CampaignId) {
        self.state.mark_deleted(id);
    }

    // ------------------------------------------------------------------
    // User and host wiring
    // ------------------------------------------------------------------

    /// Swap the engine to another user: reload that user's persisted
    /// campaigns and display state and start a fresh session.
    pub fn switch_user(&mut self, user_id: &str) {
        info!(from = %self.user_id, to = user_id, "switching user");
        self.user_id = user_id.to_string();
        self.campaigns.clear();
        self.global_rules = CampaignRules::default();
        self.cdn = CdnPaths::default();
        self.triggers = TriggerIndex::default();
        self.state = CampaignStateStore::load(self.storage.clone(), user_id, self.clock.now());
        self.restore_campaigns();
    }

    pub fn on_message(&mut self, listener: MessageListener) {
        self.message_listener = Some(listener);
    }

    pub fn on_embedded_message(&mut self, listener: EmbeddedListener) {
        self.embedded_listener = Some(listener);
    }

    pub fn on_impression(&mut self, handler: ImpressionHandler) {
        self.impression_handler = Some(handler);
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn campaign_state(&self, id: CampaignId) -> Option<&CampaignState> {
        self.state.state(id)
    }

    pub fn session(&self) -> &SessionState {
        self.state.session()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    pub fn set_qa_enabled(&mut self, enabled: bool) {
        self.qa.set_enabled(enabled);
    }

    pub fn qa_reports(&self) -> &[QaTriggerReport] {
        self.qa.reports()
    }

    pub fn drain_qa_reports(&mut self) -> Vec<QaTriggerReport> {
        self.qa.drain()
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn restore_campaigns(&mut self) {
        let Some(raw) = self.storage.get_data(&self.campaigns_key()) else {
            return;
        };
        match serde_json::from_str::<CampaignBatch>(&raw) {
            Ok(batch) => {
                self.global_rules = batch.rules;
                self.cdn = batch.cdn_paths;
                self.campaigns = batch.campaigns;
                self.triggers = TriggerIndex::rebuild(&self.campaigns);
                debug!(
                    user_id = %self.user_id,
                    campaigns = self.campaigns.len(),
                    "restored campaigns from storage"
                );
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "discarding unreadable stored campaigns");
            }
        }
    }

    fn displayable(&self, campaign: &Campaign) -> bool {
        if !self.assets.check_assets_for_campaign(campaign) {
            return false;
        }
        match campaign.kind() {
            CampaignKind::Iam => campaign.primary_message().is_some(),
            CampaignKind::Embedded => true,
        }
    }

    fn dispatch(&self, idx: usize, personalization: Option<&PersonalizationProperties>) {
        let campaign = &self.campaigns[idx];
        match campaign.kind() {
            CampaignKind::Iam => {
                if let Some(message) = campaign.primary_message() {
                    if let Some(listener) = &self.message_listener {
                        listener(message, campaign, &self.cdn.message_images);
                    }
                }
            }
            CampaignKind::Embedded => {
                if let Some(embedded) = &campaign.embedded_message {
                    if let Some(listener) = &self.embedded_listener {
                        let empty = PersonalizationProperties::new();
                        listener(embedded, personalization.unwrap_or(&empty));
                    }
                }
            }
        }
        if let Some(handler) = &self.impression_handler {
            handler(campaign);
        }
    }

    fn record_qa(&mut self, event_name: &str, payload: Option<&EventPayload>, outcome: &TriggerOutcome) {
        if !self.qa.is_enabled() {
            return;
        }
        let report = QaTriggerReport {
            event_name: event_name.to_string(),
            event_payload: Value::Object(payload.cloned().unwrap_or_default()),
            displayed: outcome.displayed(),
            reason: outcome.global_status.message.clone(),
            campaigns: outcome
                .campaigns
                .iter()
                .map(|c| QaCampaignReport {
                    id: c.id,
                    kind: c.kind,
                    displayed: c.displayed,
                    reason: c.reason.clone(),
                })
                .collect(),
        };
        self.qa.record(report);
    }

    fn campaigns_key(&self) -> String {
        format!("{CAMPAIGNS_KEY}{}", self.user_id)
    }
}
