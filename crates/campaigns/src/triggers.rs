//! Event-to-campaign matching. Trigger condition trees are parsed once when
//! a campaign list is loaded; `check_triggers` then only walks the index.

use tracing::debug;

use crate::conditions::{ConditionNode, EventPayload};
use crate::model::{Campaign, CampaignId, Trigger};

#[derive(Debug, Clone)]
struct TriggerEntry {
    campaign_id: CampaignId,
    event_name: String,
    conditions: ConditionNode,
}

/// Parsed triggers for the loaded campaign list, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    entries: Vec<TriggerEntry>,
}

impl TriggerIndex {
    pub fn rebuild(campaigns: &[Campaign]) -> Self {
        let entries: Vec<TriggerEntry> = campaigns
            .iter()
            .flat_map(|campaign| {
                campaign.triggers.iter().map(|trigger| TriggerEntry {
                    campaign_id: campaign.id,
                    event_name: trigger.event_name.to_lowercase(),
                    conditions: ConditionNode::parse(&trigger.conditions),
                })
            })
            .collect();

        debug!(triggers = entries.len(), "trigger index rebuilt");
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Campaign ids with at least one trigger matching the event name and
    /// payload, first-seen order, deduplicated.
    pub fn matching_campaigns(&self, event_name: &str, payload: Option<&EventPayload>) -> Vec<CampaignId> {
        let event_name = event_name.to_lowercase();
        let mut matched = Vec::new();
        for entry in &self.entries {
            if entry.event_name == event_name
                && entry.conditions.matches(payload)
                && !matched.contains(&entry.campaign_id)
            {
                matched.push(entry.campaign_id);
            }
        }
        matched
    }
}

/// Whether a single trigger fires for the given payload, ignoring the event
/// name. Exposed for QA tooling; the hot path goes through `TriggerIndex`.
pub fn can_trigger_with_payload(trigger: &Trigger, payload: Option<&EventPayload>) -> bool {
    ConditionNode::parse(&trigger.conditions).matches(payload)
}
