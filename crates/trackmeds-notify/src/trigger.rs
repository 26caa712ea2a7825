use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{ActionId, PayloadData};

/// Handle of a registered trigger. The only way to find and cancel it later.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// When a trigger fires and whether it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FireSpec {
    /// Fires at `first_fire`, then every 24 hours.
    Daily { first_fire: DateTime<Utc> },
    /// Fires once at `at`.
    Once { at: DateTime<Utc> },
}

impl FireSpec {
    pub fn fire_at(&self) -> DateTime<Utc> {
        match self {
            Self::Daily { first_fire } => *first_fire,
            Self::Once { at } => *at,
        }
    }

    pub fn repeats_daily(&self) -> bool {
        matches!(self, Self::Daily { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: ActionId,
    pub title: String,
}

/// What the user sees when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub channel_id: String,
    pub category_id: String,
    /// Action reported when the notification body itself is tapped.
    pub press_action: ActionId,
    pub actions: Vec<NotificationAction>,
}

/// Everything the notification service needs to register a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: TriggerId,
    pub content: NotificationContent,
    pub data: PayloadData,
    pub fire: FireSpec,
}

/// A live trigger as reported back by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub id: TriggerId,
    pub data: PayloadData,
    pub fire: FireSpec,
}

impl From<&NotificationRequest> for TriggerRecord {
    fn from(request: &NotificationRequest) -> Self {
        Self {
            id: request.id.clone(),
            data: request.data.clone(),
            fire: request.fire,
        }
    }
}
