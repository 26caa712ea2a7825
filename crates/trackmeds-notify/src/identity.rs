//! Deterministic trigger ids.
//!
//! Daily triggers are `<medicationId>_<HHMM>`, so re-registering a slot
//! replaces it. Snooze triggers are `<medicationId>_snooze_<seq>` where `seq`
//! strictly increases within the process, so several snoozes of one
//! medication coexist.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use trackmeds_common::{MedicationId, TimeOfDay};

use crate::protocol::MEDICATION_ID_KEY;
use crate::trigger::{TriggerId, TriggerRecord};

const SEPARATOR: char = '_';

pub fn regular_id(medication_id: &MedicationId, time: TimeOfDay) -> TriggerId {
    TriggerId::from_raw(format!(
        "{}{SEPARATOR}{}",
        medication_id.as_str(),
        time.compact()
    ))
}

pub fn snooze_id(medication_id: &MedicationId, sequence: i64) -> TriggerId {
    TriggerId::from_raw(format!(
        "{}{SEPARATOR}snooze{SEPARATOR}{sequence}",
        medication_id.as_str()
    ))
}

/// Millisecond timestamps, bumped by one whenever two snoozes land in the
/// same millisecond (or the clock steps back).
#[derive(Debug, Default)]
pub struct SnoozeSequence {
    last: AtomicI64,
}

impl SnoozeSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now: DateTime<Utc>) -> i64 {
        let candidate = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous + 1)
    }
}

/// Whether a live trigger belongs to `medication_id`.
///
/// The payload's `medicationId` is authoritative when present. Only records
/// without one fall back to the id prefix, and the prefix must be followed by
/// the separator so `m1` never claims `m10`'s triggers.
pub fn belongs_to(record: &TriggerRecord, medication_id: &MedicationId) -> bool {
    match record.data.get(MEDICATION_ID_KEY) {
        Some(owner) => owner == medication_id.as_str(),
        None => record
            .id
            .as_str()
            .strip_prefix(medication_id.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR)),
    }
}
