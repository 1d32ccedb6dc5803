//! Campaign targeting and admission control — decides whether, which, and
//! at most how often a server-supplied campaign may be surfaced for a fired
//! application event, under per-campaign and session-wide throttle rules,
//! priority ordering, and asset readiness.

#![warn(clippy::unwrap_used)]

pub mod assets;
pub mod conditions;
pub mod model;
pub mod qa;
pub mod rules;
pub mod selector;
pub mod state;
pub mod triggers;

pub use assets::{AlwaysReady, AssetGate, AssetRegistry};
pub use conditions::{ConditionNode, EventPayload};
pub use model::{
    Campaign, CampaignId, CampaignKind, CampaignResourceResponse, CampaignRules, EmbeddedMessage,
    Message, Trigger,
};
pub use qa::{QaCampaignReport, QaTriggerReport};
pub use rules::{RuleEvaluator, Verdict};
pub use selector::{
    CampaignEngine, CandidateReport, PersonalizationProperties, StatusReport, TriggerOutcome,
};
pub use state::{CampaignState, CampaignStateStore, CampaignStatus, SessionState};
pub use triggers::TriggerIndex;
