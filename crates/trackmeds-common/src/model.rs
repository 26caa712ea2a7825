use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::time::TimeOfDay;
use crate::types::{HistoryId, MedicationId};

/// A medication the user wants to be reminded about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: MedicationId,
    pub name: String,
    pub dosage: String,
    /// Daily reminder times, kept sorted and free of duplicates.
    pub times: BTreeSet<TimeOfDay>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Medication {
    /// Build a new, enabled medication with a fresh id.
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        times: impl IntoIterator<Item = TimeOfDay>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let medication = Self {
            id: MedicationId::new(),
            name: name.into().trim().to_string(),
            dosage: dosage.into().trim().to_string(),
            times: times.into_iter().collect(),
            enabled: true,
            created_at,
        };
        medication.validate()?;
        Ok(medication)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidMedication("name cannot be empty".into()));
        }
        if self.dosage.trim().is_empty() {
            return Err(Error::InvalidMedication("dosage cannot be empty".into()));
        }
        if self.times.is_empty() {
            return Err(Error::InvalidMedication(
                "at least one reminder time is required".into(),
            ));
        }
        Ok(())
    }

    /// Notification body text, e.g. `Aspirin - 100mg`.
    pub fn summary(&self) -> String {
        format!("{} - {}", self.name, self.dosage)
    }
}

/// Parse a list of user-entered times, rejecting the whole list if any entry
/// is malformed.
pub fn parse_times<I, S>(raw: I) -> Result<BTreeSet<TimeOfDay>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|s| s.as_ref().parse()).collect()
}

/// The user's response to a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderAction {
    Taken,
    Snoozed,
    Skipped,
}

impl ReminderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Taken => "taken",
            Self::Snoozed => "snoozed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ReminderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded response to one reminder occurrence.
///
/// `medication_id` is not checked against the medication list; entries for
/// deleted medications are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderHistory {
    pub id: HistoryId,
    pub medication_id: MedicationId,
    /// The slot the reminder was scheduled for, unchanged by snoozing.
    pub scheduled_time: TimeOfDay,
    pub action: ReminderAction,
    pub action_time: DateTime<Utc>,
}

impl ReminderHistory {
    pub fn new(
        medication_id: MedicationId,
        scheduled_time: TimeOfDay,
        action: ReminderAction,
        action_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            medication_id,
            scheduled_time,
            action,
            action_time,
        }
    }
}
