use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub reminders: ReminderConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: Some("info".to_string()),
            reminders: ReminderConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Delay before a snoozed reminder fires again.
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: i64,

    /// Maximum number of history entries kept; oldest are dropped first.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// How often the local delivery loop checks for due reminders.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            snooze_minutes: default_snooze_minutes(),
            history_limit: default_history_limit(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_snooze_minutes() -> i64 {
    trackmeds_common::SNOOZE_MINUTES
}

fn default_history_limit() -> usize {
    1000
}

fn default_poll_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_channel_id")]
    pub channel_id: String,

    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// Category that carries the confirm / snooze / skip buttons.
    #[serde(default = "default_category_id")]
    pub category_id: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_id: default_channel_id(),
            channel_name: default_channel_name(),
            category_id: default_category_id(),
        }
    }
}

fn default_channel_id() -> String {
    "medication-reminders".to_string()
}

fn default_channel_name() -> String {
    "Medication Reminders".to_string()
}

fn default_category_id() -> String {
    "medication-reminder".to_string()
}
