//! Campaign data model — the frozen server payload shape and the typed
//! campaign definitions the engine evaluates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reach_core::{ReachError, ReachResult};

pub type CampaignId = u32;

/// Priority assigned when the server omits one; numerically lower values win.
pub const DEFAULT_PRIORITY: u32 = 9999;

/// A loaded campaign definition. Immutable for the lifetime of a session
/// except through a full payload reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub rules: CampaignRules,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub message_center: bool,
    #[serde(default)]
    pub subject: String,
    /// In-app message variant payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Embedded variant payload, handed to host code instead of rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_message: Option<EmbeddedMessage>,
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    Iam,
    Embedded,
}

impl Campaign {
    pub fn kind(&self) -> CampaignKind {
        if self.embedded_message.is_some() {
            CampaignKind::Embedded
        } else {
            CampaignKind::Iam
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }

    /// The message shown when this campaign wins: lowest message priority,
    /// declaration order on ties.
    pub fn primary_message(&self) -> Option<&Message> {
        self.messages.iter().min_by_key(|m| m.priority)
    }
}

/// Throttle configuration. Used per campaign, and with the identical shape
/// as the payload-level rules applied across all campaigns in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRules {
    /// None means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_impressions: Option<u32>,
    /// Minimum gap between two displays, in milliseconds.
    #[serde(default)]
    pub min_delay_between_messages: i64,
    /// Quiet period after session start, in milliseconds.
    #[serde(default)]
    pub delay_first_message: i64,
}

impl Default for CampaignRules {
    fn default() -> Self {
        Self {
            max_impressions: None,
            min_delay_between_messages: 0,
            delay_first_message: 0,
        }
    }
}

/// A named event plus an optional condition tree. Conditions stay as raw
/// JSON here; they are parsed into a `ConditionNode` when the trigger index
/// is rebuilt at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub conditions: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub formats: Vec<MessageFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFormat {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub size: FormatSize,
    #[serde(default)]
    pub images: Vec<ImageElement>,
    #[serde(default)]
    pub buttons: Vec<ButtonElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Landscape,
    Portrait,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FormatSize {
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
}

/// A static image element; `name` is the CDN asset identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageElement {
    pub name: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonElement {
    #[serde(default)]
    pub name: String,
    /// CDN asset identifier for the button image.
    pub image_up: String,
    #[serde(default)]
    pub action_type: ButtonAction,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    #[default]
    Dismiss,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedMessage {
    pub id: u32,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub data: String,
    #[serde(rename = "type", default)]
    pub data_type: EmbeddedDataType,
    #[serde(default)]
    pub buttons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddedDataType {
    Json,
    #[default]
    Other,
}

/// CDN roots for downloadable campaign assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdnPaths {
    #[serde(default)]
    pub message_images: String,
    #[serde(default)]
    pub message_fonts: String,
}

/// The `campaigns` object of a user-content response: the campaign list,
/// the session-wide rules, and where to fetch assets from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignBatch {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    /// Rules applied across all campaigns collectively.
    #[serde(default)]
    pub rules: CampaignRules,
    #[serde(default)]
    pub cdn_paths: CdnPaths,
}

/// Top-level shape of the server's user-content response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignResourceResponse {
    #[serde(default)]
    pub campaigns: CampaignBatch,
}

impl CampaignResourceResponse {
    /// Parse a raw response body. A campaign missing required fields (no
    /// `id`, no dates) is a malformed payload and is rejected here, before
    /// any engine state is touched.
    pub fn from_json(raw: &str) -> ReachResult<Self> {
        serde_json::from_str(raw).map_err(|e| ReachError::Payload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn campaign_json() -> Value {
        json!({
            "id": 298948,
            "priority": 1,
            "start_date": 1_400_000_000_000u64,
            "end_date": 1_500_000_000_000u64,
            "rules": { "max_impressions": 3, "min_delay_between_messages": 60_000 },
            "triggers": [
                { "event_name": "tv.event_simple" },
                {
                    "event_name": "song1.played",
                    "conditions": {
                        "op": "and",
                        "args": [
                            { "key": "artist", "value": "prince", "op": "eq" },
                            { "key": "song", "value": "purple rain", "op": "eq" },
                        ],
                    },
                },
            ],
            "messages": [{
                "id": 317653,
                "name": "welcome",
                "formats": [{
                    "name": "landscape full",
                    "orientation": "landscape",
                    "size": { "w": 1920, "h": 1080 },
                    "images": [{ "name": "asset-img-1" }],
                    "buttons": [{ "name": "ok", "image_up": "asset-btn-1" }],
                }],
            }],
        })
    }

    #[test]
    fn test_parse_full_response() {
        let raw = json!({
            "campaigns": {
                "campaigns": [campaign_json()],
                "rules": { "max_impressions": 10, "delay_first_message": 1000 },
                "cdn_paths": {
                    "message_images": "https://cdn.example.com/images/",
                    "message_fonts": "https://cdn.example.com/fonts/",
                },
            },
        })
        .to_string();

        let response = CampaignResourceResponse::from_json(&raw).unwrap();
        let batch = &response.campaigns;
        assert_eq!(batch.campaigns.len(), 1);
        assert_eq!(batch.rules.max_impressions, Some(10));
        assert_eq!(batch.cdn_paths.message_images, "https://cdn.example.com/images/");

        let campaign = &batch.campaigns[0];
        assert_eq!(campaign.id, 298948);
        assert_eq!(campaign.kind(), CampaignKind::Iam);
        assert_eq!(campaign.rules.max_impressions, Some(3));
        assert_eq!(campaign.triggers.len(), 2);
        assert_eq!(campaign.start_date.timestamp_millis(), 1_400_000_000_000);
    }

    #[test]
    fn test_campaign_without_id_is_rejected() {
        let raw = json!({
            "campaigns": {
                "campaigns": [{
                    "priority": 1,
                    "start_date": 0,
                    "end_date": 1,
                }],
            },
        })
        .to_string();

        assert!(matches!(
            CampaignResourceResponse::from_json(&raw),
            Err(ReachError::Payload(_))
        ));
    }

    #[test]
    fn test_missing_priority_defaults_low() {
        let mut value = campaign_json();
        value.as_object_mut().unwrap().remove("priority");
        let campaign: Campaign = serde_json::from_value(value).unwrap();
        assert_eq!(campaign.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_embedded_campaign_kind() {
        let campaign: Campaign = serde_json::from_value(json!({
            "id": 1,
            "start_date": 0,
            "end_date": 1,
            "embedded_message": {
                "id": 9,
                "data": "This data is of string format or really anything",
                "type": "other",
            },
        }))
        .unwrap();

        assert_eq!(campaign.kind(), CampaignKind::Embedded);
        assert_eq!(
            campaign.embedded_message.unwrap().data_type,
            EmbeddedDataType::Other
        );
    }

    #[test]
    fn test_active_window() {
        let campaign: Campaign = serde_json::from_value(campaign_json()).unwrap();
        let inside = chrono::DateTime::from_timestamp_millis(1_450_000_000_000).unwrap();
        let before = chrono::DateTime::from_timestamp_millis(1_399_999_999_999).unwrap();
        let after = chrono::DateTime::from_timestamp_millis(1_500_000_000_001).unwrap();

        assert!(campaign.is_active(inside));
        assert!(!campaign.is_active(before));
        assert!(!campaign.is_active(after));
    }

    #[test]
    fn test_primary_message_prefers_lowest_priority() {
        let campaign: Campaign = serde_json::from_value(json!({
            "id": 1,
            "start_date": 0,
            "end_date": 1,
            "messages": [
                { "id": 10, "priority": 5 },
                { "id": 11, "priority": 2 },
                { "id": 12, "priority": 2 },
            ],
        }))
        .unwrap();

        assert_eq!(campaign.primary_message().unwrap().id, 11);
    }
}
