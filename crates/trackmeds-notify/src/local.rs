use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use trackmeds_common::{Error, Result, TimeOfDay, next_occurrence};
use trackmeds_config::NotificationConfig;
use tracing::{debug, info};

use crate::protocol::{ActionId, NotifierEvent, PayloadData};
use crate::traits::Notifier;
use crate::trigger::{FireSpec, NotificationRequest, TriggerId, TriggerRecord};

const EVENT_CAPACITY: usize = 64;

/// In-process notification service.
///
/// Keeps triggers in memory, fires them when [`LocalNotifier::deliver_due`]
/// is called, and reports deliveries and presses on a broadcast channel.
pub struct LocalNotifier {
    triggers: Mutex<BTreeMap<TriggerId, NotificationRequest>>,
    /// Delivered notifications still on screen, keyed by trigger id.
    presented: Mutex<HashMap<TriggerId, PayloadData>>,
    permission_granted: AtomicBool,
    events: broadcast::Sender<NotifierEvent>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            triggers: Mutex::new(BTreeMap::new()),
            presented: Mutex::new(HashMap::new()),
            permission_granted: AtomicBool::new(true),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifierEvent> {
        self.events.subscribe()
    }

    /// Grant or revoke notification permission. While revoked, registering
    /// triggers fails.
    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// Fire every trigger due at `now`. Daily triggers move to their next
    /// local wall-clock occurrence after `now`; one-shot triggers are removed.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Result<Vec<NotificationRequest>> {
        let mut due = Vec::new();
        {
            let mut triggers = lock(&self.triggers)?;
            let ids: Vec<TriggerId> = triggers
                .iter()
                .filter(|(_, request)| request.fire.fire_at() <= now)
                .map(|(id, _)| id.clone())
                .collect();

            for id in ids {
                let Some(request) = triggers.remove(&id) else {
                    continue;
                };
                if let FireSpec::Daily { first_fire } = request.fire {
                    let mut next = request.clone();
                    next.fire = FireSpec::Daily {
                        first_fire: next_daily_fire(first_fire, now, &Local)?,
                    };
                    triggers.insert(id, next);
                }
                due.push(request);
            }
        }

        let mut presented = lock(&self.presented)?;
        for request in &due {
            debug!("delivering {} ({})", request.id, request.content.body);
            presented.insert(request.id.clone(), request.data.clone());
            let _ = self.events.send(NotifierEvent::Delivered {
                trigger_id: Some(request.id.clone()),
                data: request.data.clone(),
            });
        }

        Ok(due)
    }

    /// Simulate the user tapping a delivered notification. `None` taps the
    /// body; `Some(action)` taps a button.
    pub fn press(&self, id: &TriggerId, action: Option<ActionId>) -> Result<()> {
        let data = lock(&self.presented)?
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("no delivered notification {id}")))?;

        let event = match action {
            None => NotifierEvent::Pressed {
                action_id: Some(ActionId::Default.as_str().to_string()),
                data,
            },
            Some(action) => NotifierEvent::ActionPressed {
                action_id: Some(action.as_str().to_string()),
                data,
            },
        };
        let _ = self.events.send(event);
        Ok(())
    }

    /// Notifications delivered but not yet acted on.
    pub fn presented(&self) -> Result<Vec<TriggerId>> {
        Ok(lock(&self.presented)?.keys().cloned().collect())
    }

    fn ensure_permission(&self) -> Result<()> {
        if self.permission_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::CollaboratorUnavailable(
                "notification permission not granted".into(),
            ))
        }
    }
}

impl Default for LocalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// The occurrence after `now` of the wall-clock time in `tz` at which a
/// daily trigger last fired. Adding whole UTC days would drift by an hour
/// across a DST change.
fn next_daily_fire<Tz: TimeZone>(
    fired_at: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<DateTime<Utc>> {
    let local = fired_at.with_timezone(tz);
    let time = TimeOfDay::new(local.hour() as u8, local.minute() as u8)?;
    Ok(next_occurrence(time, &now.with_timezone(tz)).with_timezone(&Utc))
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::CollaboratorUnavailable("notifier state lock poisoned".into()))
}

#[async_trait]
impl Notifier for LocalNotifier {
    fn notifier_id(&self) -> &str {
        "local"
    }

    async fn initialize(&self, config: &NotificationConfig) -> Result<()> {
        info!(
            "notification channel {} ({}) ready with category {}",
            config.channel_id, config.channel_name, config.category_id
        );
        Ok(())
    }

    async fn request_permission(&self) -> Result<bool> {
        Ok(self.permission_granted.load(Ordering::SeqCst))
    }

    async fn register_trigger(&self, request: NotificationRequest) -> Result<()> {
        self.ensure_permission()?;
        debug!(
            "registering trigger {} at {}",
            request.id,
            request.fire.fire_at()
        );
        lock(&self.triggers)?.insert(request.id.clone(), request);
        Ok(())
    }

    async fn list_triggers(&self) -> Result<Vec<TriggerRecord>> {
        Ok(lock(&self.triggers)?
            .values()
            .map(TriggerRecord::from)
            .collect())
    }

    async fn cancel_trigger(&self, id: &TriggerId) -> Result<()> {
        lock(&self.triggers)?.remove(id);
        Ok(())
    }

    async fn cancel_all_triggers(&self) -> Result<()> {
        lock(&self.triggers)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TriggerBuilder;
    use trackmeds_common::{Medication, MedicationId, parse_times};

    fn medication() -> Medication {
        let mut med =
            Medication::new("Aspirin", "100mg", parse_times(["09:00"]).unwrap(), Utc::now())
                .unwrap();
        med.id = MedicationId::from_str("m1");
        med
    }

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, h, m, 0).unwrap()
    }

    fn builder() -> TriggerBuilder {
        TriggerBuilder::new(NotificationConfig::default(), 30)
    }

    #[tokio::test]
    async fn registering_same_id_replaces_trigger() {
        let notifier = LocalNotifier::new();
        let builder = builder();
        let med = medication();
        let time = "09:00".parse().unwrap();

        notifier
            .register_trigger(builder.daily(&med, time, &at(1, 8, 0)))
            .await
            .unwrap();
        notifier
            .register_trigger(builder.daily(&med, time, &at(1, 10, 0)))
            .await
            .unwrap();

        let triggers = notifier.list_triggers().await.unwrap();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].fire.fire_at(), at(2, 9, 0));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let notifier = LocalNotifier::new();
        let id = TriggerId::from_raw("m1_0900");
        notifier.cancel_trigger(&id).await.unwrap();
        notifier.cancel_trigger(&id).await.unwrap();
        assert!(notifier.list_triggers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoked_permission_rejects_registration() {
        let notifier = LocalNotifier::new();
        notifier.set_permission(false);

        assert!(!notifier.request_permission().await.unwrap());
        let err = notifier
            .register_trigger(builder().daily(&medication(), "09:00".parse().unwrap(), &at(1, 8, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CollaboratorUnavailable(_)));
    }

    #[tokio::test]
    async fn deliver_due_repeats_daily_and_drops_one_shots() {
        let notifier = LocalNotifier::new();
        let builder = builder();
        let med = medication();
        let time = "09:00".parse().unwrap();
        notifier
            .register_trigger(builder.daily(&med, time, &at(1, 8, 0)))
            .await
            .unwrap();
        notifier
            .register_trigger(builder.snooze(&med, time, &at(1, 8, 45)))
            .await
            .unwrap();

        let mut events = notifier.subscribe();
        let delivered = notifier.deliver_due(at(1, 9, 20)).unwrap();
        assert_eq!(delivered.len(), 2);

        let remaining = notifier.list_triggers().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "m1_0900");
        assert_eq!(remaining[0].fire.fire_at(), at(2, 9, 0));

        let first = events.recv().await.unwrap();
        assert!(matches!(first, NotifierEvent::Delivered { .. }));
    }

    #[test]
    fn daily_fire_keeps_wall_clock_across_dst_start() {
        let tz = chrono_tz::America::New_York;
        // 09:00 EST on the day before clocks go forward.
        let fired_at = Utc.with_ymd_and_hms(2026, 3, 7, 14, 0, 0).unwrap();

        let next = next_daily_fire(fired_at, fired_at, &tz).unwrap();

        // 09:00 EDT is an hour earlier in UTC.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 8, 13, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&tz).hour(), 9);
    }

    #[test]
    fn daily_fire_skips_missed_days() {
        let fired_at = at(1, 9, 0);
        let next = next_daily_fire(fired_at, at(4, 12, 0), &Utc).unwrap();
        assert_eq!(next, at(5, 9, 0));
    }

    #[tokio::test]
    async fn nothing_is_delivered_early() {
        let notifier = LocalNotifier::new();
        notifier
            .register_trigger(builder().daily(&medication(), "09:00".parse().unwrap(), &at(1, 8, 0)))
            .await
            .unwrap();

        assert!(notifier.deliver_due(at(1, 8, 59)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn press_emits_action_event_once() {
        let notifier = LocalNotifier::new();
        notifier
            .register_trigger(builder().daily(&medication(), "09:00".parse().unwrap(), &at(1, 8, 0)))
            .await
            .unwrap();
        notifier.deliver_due(at(1, 9, 0)).unwrap();

        let mut events = notifier.subscribe();
        let id = TriggerId::from_raw("m1_0900");
        notifier.press(&id, Some(ActionId::Skip)).unwrap();

        match events.recv().await.unwrap() {
            NotifierEvent::ActionPressed { action_id, data } => {
                assert_eq!(action_id.as_deref(), Some("skip"));
                assert_eq!(data.get("medicationId").map(String::as_str), Some("m1"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            notifier.press(&id, Some(ActionId::Skip)),
            Err(Error::NotFound(_))
        ));
    }
}
