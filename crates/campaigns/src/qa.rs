//! QA telemetry. For flagged users every trigger evaluation is recorded as
//! a structured report, whatever the outcome, so campaign targeting can be
//! debugged from the dashboard without reproducing device state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::model::{CampaignId, CampaignKind};

/// Per-candidate entry of a trigger report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaCampaignReport {
    pub id: CampaignId,
    #[serde(rename = "type")]
    pub kind: CampaignKind,
    pub displayed: bool,
    pub reason: String,
}

/// One report per `check_triggers` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaTriggerReport {
    pub event_name: String,
    pub event_payload: Value,
    pub displayed: bool,
    pub reason: String,
    pub campaigns: Vec<QaCampaignReport>,
}

/// Buffers trigger reports for QA users. The host drains the buffer into
/// its QA event upload; non-QA users pay nothing but the enabled check.
pub struct QaLogger {
    enabled: bool,
    max_buffered: usize,
    reports: Vec<QaTriggerReport>,
}

impl QaLogger {
    pub fn new(enabled: bool, max_buffered: usize) -> Self {
        Self {
            enabled,
            max_buffered,
            reports: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reports.clear();
        }
    }

    pub fn record(&mut self, report: QaTriggerReport) {
        if !self.enabled {
            return;
        }
        debug!(
            event_name = %report.event_name,
            displayed = report.displayed,
            reason = %report.reason,
            candidates = report.campaigns.len(),
            "campaign trigger evaluated"
        );
        while self.reports.len() >= self.max_buffered.max(1) {
            self.reports.remove(0);
        }
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[QaTriggerReport] {
        &self.reports
    }

    pub fn drain(&mut self) -> Vec<QaTriggerReport> {
        std::mem::take(&mut self.reports)
    }
}
