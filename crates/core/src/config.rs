use serde::Deserialize;

/// SDK configuration. Loaded from environment variables with the prefix
/// `REACH_SDK__`; every field has a usable default so embedding hosts can
/// construct the engine without any external configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SdkConfig {
    #[serde(default = "default_app_id")]
    pub app_id: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub qa: QaConfig,
    #[serde(default)]
    pub messages: MessageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QaConfig {
    /// When set, a trigger report is recorded for every check_triggers call.
    #[serde(default = "default_qa_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_buffered_reports")]
    pub max_buffered_reports: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageConfig {
    /// Host-side cap on how long auto-show at session start may wait for the
    /// first campaign payload. The engine itself never sleeps on this; it is
    /// plumbing for the orchestration layer.
    #[serde(default = "default_autoshow_max_delay_ms")]
    pub autoshow_max_delay_ms: u64,
    #[serde(default = "default_default_priority")]
    pub default_priority: u32,
}

fn default_app_id() -> u32 {
    0
}
fn default_language() -> String {
    "en".to_string()
}
fn default_qa_enabled() -> bool {
    false
}
fn default_max_buffered_reports() -> usize {
    100
}
fn default_autoshow_max_delay_ms() -> u64 {
    5000
}
fn default_default_priority() -> u32 {
    9999
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            enabled: default_qa_enabled(),
            max_buffered_reports: default_max_buffered_reports(),
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            autoshow_max_delay_ms: default_autoshow_max_delay_ms(),
            default_priority: default_default_priority(),
        }
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            language: default_language(),
            qa: QaConfig::default(),
            messages: MessageConfig::default(),
        }
    }
}

impl SdkConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("REACH_SDK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
