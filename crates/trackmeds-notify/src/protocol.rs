use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use trackmeds_common::{Error, MedicationId, ReminderAction, Result, TimeOfDay};

use crate::trigger::TriggerId;

/// Loosely-typed string map attached to a notification, as the notification
/// service stores and returns it.
pub type PayloadData = BTreeMap<String, String>;

pub const MEDICATION_ID_KEY: &str = "medicationId";
pub const MEDICATION_NAME_KEY: &str = "medicationName";
pub const DOSAGE_KEY: &str = "dosage";
pub const SCHEDULED_TIME_KEY: &str = "scheduledTime";
pub const IS_SNOOZED_KEY: &str = "isSnoozed";

/// Identifier of a press action. Response buttons map to a
/// [`ReminderAction`]; a plain tap on the notification body does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionId {
    Default,
    Confirm,
    Snooze,
    Skip,
}

impl ActionId {
    pub const RESPONSES: [ActionId; 3] = [ActionId::Confirm, ActionId::Snooze, ActionId::Skip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Confirm => "confirm",
            Self::Snooze => "snooze",
            Self::Skip => "skip",
        }
    }

    /// Unknown identifiers yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "default" => Some(Self::Default),
            "confirm" => Some(Self::Confirm),
            "snooze" => Some(Self::Snooze),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    pub fn reminder_action(&self) -> Option<ReminderAction> {
        match self {
            Self::Default => None,
            Self::Confirm => Some(ReminderAction::Taken),
            Self::Snooze => Some(ReminderAction::Snoozed),
            Self::Skip => Some(ReminderAction::Skipped),
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated form of the data carried by a reminder notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub medication_id: MedicationId,
    pub medication_name: String,
    pub dosage: String,
    /// The daily slot this reminder belongs to, preserved through snoozes.
    pub scheduled_time: TimeOfDay,
    pub is_snoozed: bool,
}

impl ReminderPayload {
    pub fn to_data(&self) -> PayloadData {
        let mut data = PayloadData::new();
        data.insert(
            MEDICATION_ID_KEY.to_string(),
            self.medication_id.as_str().to_string(),
        );
        data.insert(MEDICATION_NAME_KEY.to_string(), self.medication_name.clone());
        data.insert(DOSAGE_KEY.to_string(), self.dosage.clone());
        data.insert(
            SCHEDULED_TIME_KEY.to_string(),
            self.scheduled_time.to_string(),
        );
        if self.is_snoozed {
            data.insert(IS_SNOOZED_KEY.to_string(), "true".to_string());
        }
        data
    }

    /// Validate raw notification data. `medicationId` and `scheduledTime`
    /// are required; the display fields default to empty.
    pub fn from_data(data: &PayloadData) -> Result<Self> {
        let medication_id = data
            .get(MEDICATION_ID_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedEvent(format!("missing {MEDICATION_ID_KEY}")))?;

        let raw_time = data
            .get(SCHEDULED_TIME_KEY)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::MalformedEvent(format!("missing {SCHEDULED_TIME_KEY}")))?;
        let scheduled_time: TimeOfDay = raw_time.parse().map_err(|_| {
            Error::MalformedEvent(format!("invalid {SCHEDULED_TIME_KEY}: {raw_time:?}"))
        })?;

        Ok(Self {
            medication_id: MedicationId::from_str(medication_id),
            medication_name: data.get(MEDICATION_NAME_KEY).cloned().unwrap_or_default(),
            dosage: data.get(DOSAGE_KEY).cloned().unwrap_or_default(),
            scheduled_time,
            is_snoozed: data.get(IS_SNOOZED_KEY).is_some_and(|v| v == "true"),
        })
    }
}

/// Events emitted by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierEvent {
    /// A reminder was shown to the user.
    Delivered {
        trigger_id: Option<TriggerId>,
        data: PayloadData,
    },
    /// The notification body was tapped.
    Pressed {
        action_id: Option<String>,
        data: PayloadData,
    },
    /// One of the notification's action buttons was tapped.
    ActionPressed {
        action_id: Option<String>,
        data: PayloadData,
    },
}

impl NotifierEvent {
    pub fn data(&self) -> &PayloadData {
        match self {
            Self::Delivered { data, .. }
            | Self::Pressed { data, .. }
            | Self::ActionPressed { data, .. } => data,
        }
    }
}
