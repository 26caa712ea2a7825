use chrono::{DateTime, TimeZone, Utc};
use trackmeds_common::{Medication, TimeOfDay, next_occurrence, snooze_occurrence};
use trackmeds_config::NotificationConfig;

use crate::identity::{SnoozeSequence, regular_id, snooze_id};
use crate::protocol::{ActionId, ReminderPayload};
use crate::trigger::{FireSpec, NotificationAction, NotificationContent, NotificationRequest};

const DAILY_TITLE: &str = "Time to take your medication";
const SNOOZE_TITLE: &str = "Snoozed Medication Reminder";

/// Builds trigger requests for a medication's daily slots and snoozes.
///
/// Every request carries the same three response buttons so inbound presses
/// can be resolved by fixed action ids.
pub struct TriggerBuilder {
    config: NotificationConfig,
    snooze_minutes: i64,
    sequence: SnoozeSequence,
}

impl TriggerBuilder {
    pub fn new(config: NotificationConfig, snooze_minutes: i64) -> Self {
        Self {
            config,
            snooze_minutes,
            sequence: SnoozeSequence::new(),
        }
    }

    pub fn snooze_minutes(&self) -> i64 {
        self.snooze_minutes
    }

    /// Daily trigger for `time`, first firing at its next occurrence in
    /// `now`'s time zone.
    pub fn daily<Tz: TimeZone>(
        &self,
        medication: &Medication,
        time: TimeOfDay,
        now: &DateTime<Tz>,
    ) -> NotificationRequest {
        let first_fire = next_occurrence(time, now).with_timezone(&Utc);
        NotificationRequest {
            id: regular_id(&medication.id, time),
            content: self.content(DAILY_TITLE, medication),
            data: payload(medication, time, false).to_data(),
            fire: FireSpec::Daily { first_fire },
        }
    }

    /// One-shot trigger firing `snooze_minutes` after `now`. The payload keeps
    /// `original_time` so the eventual response is attributed to that slot.
    pub fn snooze<Tz: TimeZone>(
        &self,
        medication: &Medication,
        original_time: TimeOfDay,
        now: &DateTime<Tz>,
    ) -> NotificationRequest {
        let at = snooze_occurrence(now, self.snooze_minutes).with_timezone(&Utc);
        let sequence = self.sequence.next(now.with_timezone(&Utc));
        NotificationRequest {
            id: snooze_id(&medication.id, sequence),
            content: self.content(SNOOZE_TITLE, medication),
            data: payload(medication, original_time, true).to_data(),
            fire: FireSpec::Once { at },
        }
    }

    pub fn response_actions(&self) -> Vec<NotificationAction> {
        ActionId::RESPONSES
            .iter()
            .map(|id| NotificationAction {
                id: *id,
                title: match id {
                    ActionId::Confirm => "Confirm Taken".to_string(),
                    ActionId::Snooze => format!("Snooze {} min", self.snooze_minutes),
                    _ => "Skip".to_string(),
                },
            })
            .collect()
    }

    fn content(&self, title: &str, medication: &Medication) -> NotificationContent {
        NotificationContent {
            title: title.to_string(),
            body: medication.summary(),
            channel_id: self.config.channel_id.clone(),
            category_id: self.config.category_id.clone(),
            press_action: ActionId::Default,
            actions: self.response_actions(),
        }
    }
}

fn payload(medication: &Medication, time: TimeOfDay, is_snoozed: bool) -> ReminderPayload {
    ReminderPayload {
        medication_id: medication.id.clone(),
        medication_name: medication.name.clone(),
        dosage: medication.dosage.clone(),
        scheduled_time: time,
        is_snoozed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{IS_SNOOZED_KEY, SCHEDULED_TIME_KEY};
    use chrono::{Duration, FixedOffset, Timelike};
    use trackmeds_common::{MedicationId, parse_times};

    fn medication() -> Medication {
        let mut med = Medication::new(
            "Aspirin",
            "100mg",
            parse_times(["09:00", "21:00"]).unwrap(),
            Utc::now(),
        )
        .unwrap();
        med.id = MedicationId::from_str("m1");
        med
    }

    fn builder() -> TriggerBuilder {
        TriggerBuilder::new(NotificationConfig::default(), 30)
    }

    #[test]
    fn daily_trigger_targets_next_occurrence() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap();
        let request = builder().daily(&medication(), "09:00".parse().unwrap(), &now);

        assert_eq!(request.id.as_str(), "m1_0900");
        assert_eq!(
            request.fire,
            FireSpec::Daily {
                first_fire: Utc.with_ymd_and_hms(2026, 6, 2, 9, 0, 0).unwrap()
            }
        );
        assert_eq!(request.content.title, "Time to take your medication");
        assert_eq!(request.content.body, "Aspirin - 100mg");
        assert_eq!(
            request.data.get(SCHEDULED_TIME_KEY).map(String::as_str),
            Some("09:00")
        );
        assert!(!request.data.contains_key(IS_SNOOZED_KEY));
    }

    #[test]
    fn daily_trigger_uses_wall_clock_of_given_zone() {
        let tz = FixedOffset::west_opt(4 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap().with_timezone(&tz);
        let request = builder().daily(&medication(), "21:00".parse().unwrap(), &now);

        let local = request.fire.fire_at().with_timezone(&tz);
        assert_eq!((local.hour(), local.minute()), (21, 0));
        assert!(request.fire.fire_at() > now.with_timezone(&Utc));
    }

    #[test]
    fn snooze_trigger_is_one_shot_and_keeps_original_slot() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 2, 0).unwrap();
        let request = builder().snooze(&medication(), "09:00".parse().unwrap(), &now);

        assert!(request.id.as_str().starts_with("m1_snooze_"));
        assert_eq!(
            request.fire,
            FireSpec::Once {
                at: now + Duration::minutes(30)
            }
        );
        assert_eq!(request.content.title, "Snoozed Medication Reminder");
        assert_eq!(
            request.data.get(SCHEDULED_TIME_KEY).map(String::as_str),
            Some("09:00")
        );
        assert_eq!(request.data.get(IS_SNOOZED_KEY).map(String::as_str), Some("true"));
    }

    #[test]
    fn consecutive_snoozes_get_distinct_ids() {
        let builder = builder();
        let now = Utc::now();
        let first = builder.snooze(&medication(), "09:00".parse().unwrap(), &now);
        let second = builder.snooze(&medication(), "09:00".parse().unwrap(), &now);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn every_trigger_carries_the_three_response_actions() {
        let now = Utc::now();
        let builder = builder();
        for request in [
            builder.daily(&medication(), "09:00".parse().unwrap(), &now),
            builder.snooze(&medication(), "09:00".parse().unwrap(), &now),
        ] {
            let ids: Vec<ActionId> = request.content.actions.iter().map(|a| a.id).collect();
            assert_eq!(ids, ActionId::RESPONSES.to_vec());
            assert_eq!(request.content.press_action, ActionId::Default);
            assert_eq!(request.content.category_id, "medication-reminder");
        }
        assert_eq!(builder.response_actions()[1].title, "Snooze 30 min");
    }
}
