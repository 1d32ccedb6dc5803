//! Eligibility rules. Each candidate campaign is checked against its own
//! throttle configuration and the session-wide rules; the first violated
//! check decides the verdict. When a per-campaign and a global rule are
//! violated at the same time the global code is reported, so the session
//! rules are checked first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{Campaign, CampaignRules};
use crate::state::{CampaignState, SessionState};

/// Outcome of evaluating one campaign against one trigger invocation.
/// `code()` preserves the wire values shared with the mobile SDKs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    ThrottleRecent,
    ThrottleMaxImpressions,
    ThrottleLaunchTime,
    NotActive,
    InvalidTriggers,
    NoMatch,
    Match,
    NotDownloaded,
    EligibleButOtherChosen,
    GlobalThrottleMaxImpressions,
    GlobalThrottleRecent,
    GlobalThrottleLaunchTime,
}

impl Verdict {
    pub fn code(self) -> u8 {
        match self {
            Verdict::ThrottleRecent => 0,
            Verdict::ThrottleMaxImpressions => 1,
            Verdict::ThrottleLaunchTime => 2,
            Verdict::NotActive => 4,
            Verdict::InvalidTriggers => 5,
            Verdict::NoMatch => 6,
            Verdict::Match => 7,
            Verdict::NotDownloaded => 8,
            Verdict::EligibleButOtherChosen => 10,
            Verdict::GlobalThrottleMaxImpressions => 11,
            Verdict::GlobalThrottleRecent => 12,
            Verdict::GlobalThrottleLaunchTime => 13,
        }
    }

    pub fn is_match(self) -> bool {
        self == Verdict::Match
    }
}

/// Human-readable reason recorded in trigger reports.
pub fn describe(verdict: Verdict, campaign: &Campaign) -> String {
    let id = campaign.id;
    match verdict {
        Verdict::ThrottleRecent => {
            format!("campaign {id} shown too recently")
        }
        Verdict::ThrottleMaxImpressions => {
            format!("campaign {id} reached its impression limit")
        }
        Verdict::ThrottleLaunchTime => {
            format!("campaign {id} throttled: too soon after session start")
        }
        Verdict::NotActive => format!("campaign {id} is outside its active window"),
        Verdict::InvalidTriggers => format!("campaign {id} has invalid triggers"),
        Verdict::NoMatch => format!("campaign {id} did not match"),
        Verdict::Match => format!("campaign {id} matched"),
        Verdict::NotDownloaded => format!("campaign {id} assets not downloaded"),
        Verdict::EligibleButOtherChosen => {
            format!("campaign {id} was eligible but a higher priority campaign was chosen")
        }
        Verdict::GlobalThrottleMaxImpressions => {
            format!("campaign {id} blocked: session impression limit reached")
        }
        Verdict::GlobalThrottleRecent => {
            format!("campaign {id} blocked: a campaign was shown too recently this session")
        }
        Verdict::GlobalThrottleLaunchTime => {
            format!("campaign {id} blocked: too soon after session start for any campaign")
        }
    }
}

pub struct RuleEvaluator<'a> {
    pub global_rules: &'a CampaignRules,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(global_rules: &'a CampaignRules) -> Self {
        Self { global_rules }
    }

    /// Evaluate every throttle rule for one campaign, strictly bounded by
    /// `now`. Returns `Match` only when no rule is violated.
    pub fn evaluate(
        &self,
        campaign: &Campaign,
        state: &CampaignState,
        session: &SessionState,
        now: DateTime<Utc>,
    ) -> Verdict {
        if !campaign.is_active(now) {
            return Verdict::NotActive;
        }

        // Session-wide rules first: the global code wins when both a
        // per-campaign and a global rule are violated.
        if let Some(verdict) = Self::check_throttles(
            self.global_rules,
            session.global_impressions,
            session.global_last_shown,
            session.session_start,
            now,
            Verdict::GlobalThrottleMaxImpressions,
            Verdict::GlobalThrottleRecent,
            Verdict::GlobalThrottleLaunchTime,
        ) {
            trace!(campaign_id = campaign.id, verdict = ?verdict, "global rule violated");
            return verdict;
        }

        if let Some(verdict) = Self::check_throttles(
            &campaign.rules,
            state.impressions,
            state.last_shown,
            session.session_start,
            now,
            Verdict::ThrottleMaxImpressions,
            Verdict::ThrottleRecent,
            Verdict::ThrottleLaunchTime,
        ) {
            trace!(campaign_id = campaign.id, verdict = ?verdict, "campaign rule violated");
            return verdict;
        }

        Verdict::Match
    }

    #[allow(clippy::too_many_arguments)]
    fn check_throttles(
        rules: &CampaignRules,
        impressions: u32,
        last_shown: Option<DateTime<Utc>>,
        session_start: DateTime<Utc>,
        now: DateTime<Utc>,
        max_impressions_verdict: Verdict,
        recent_verdict: Verdict,
        launch_verdict: Verdict,
    ) -> Option<Verdict> {
        if let Some(max) = rules.max_impressions {
            if impressions >= max {
                return Some(max_impressions_verdict);
            }
        }

        if let Some(last) = last_shown {
            if now - last < Duration::milliseconds(rules.min_delay_between_messages) {
                return Some(recent_verdict);
            }
        }

        if now - session_start < Duration::milliseconds(rules.delay_first_message) {
            return Some(launch_verdict);
        }

        None
    }
}
