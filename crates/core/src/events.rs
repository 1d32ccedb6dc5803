//! Event-name rules shared by the event pipeline and the campaign engine.

use crate::error::{ReachError, ReachResult};

/// Namespace reserved for SDK-internal events.
pub const RESERVED_EVENT_PREFIX: &str = "Reach.";

/// Internal event fired once per session to drive session-start campaigns.
pub const SESSION_START_TRIGGER: &str = "Reach.Messages.showAtSessionStart";

/// Validate a host-supplied event name. Names in the reserved `Reach.`
/// namespace are refused so host events can never collide with internal
/// triggers.
pub fn validate_event_name(name: &str) -> ReachResult<()> {
    if name.is_empty() {
        return Err(ReachError::EventName("event name is empty".to_string()));
    }
    if name.to_ascii_lowercase().contains("reach.") {
        return Err(ReachError::EventName(format!(
            "event name may not use the reserved Reach namespace: {name}"
        )));
    }
    Ok(())
}
