use chrono::{DateTime, Utc};
use std::sync::Arc;
use trackmeds_common::{MedicationId, ReminderAction, ReminderHistory, Result, TimeOfDay};
use trackmeds_db::ReminderStore;
use tracing::{debug, info};

/// Default cap on stored history entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Appends user responses to the history log and keeps it bounded.
pub struct ActionRecorder {
    store: Arc<ReminderStore>,
    history_limit: usize,
}

impl ActionRecorder {
    pub fn new(store: Arc<ReminderStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit: history_limit.max(1),
        }
    }

    /// Append an entry and drop the oldest entries beyond the limit.
    ///
    /// The medication is not required to exist.
    pub async fn record(
        &self,
        medication_id: &MedicationId,
        scheduled_time: TimeOfDay,
        action: ReminderAction,
        now: DateTime<Utc>,
    ) -> Result<ReminderHistory> {
        let entry = ReminderHistory::new(medication_id.clone(), scheduled_time, action, now);
        let limit = self.history_limit;

        let stored = entry.clone();
        let evicted = self
            .store
            .modify_history(move |history| {
                history.push(stored);
                let excess = history.len().saturating_sub(limit);
                history.drain(..excess);
                excess
            })
            .await?;

        if evicted > 0 {
            debug!("evicted {evicted} old history entries");
        }
        info!("recorded {action} for medication {medication_id} at {scheduled_time}");
        Ok(entry)
    }

    /// Responses recorded for one medication, oldest first.
    pub async fn history_for(&self, medication_id: &MedicationId) -> Vec<ReminderHistory> {
        self.store.history_for_medication(medication_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionRecorder, DEFAULT_HISTORY_LIMIT};
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use trackmeds_common::{MedicationId, ReminderAction};
    use trackmeds_db::{ReminderStore, SqliteKvStore};

    fn recorder(limit: usize) -> (Arc<ReminderStore>, ActionRecorder) {
        let kv = Arc::new(SqliteKvStore::in_memory().expect("failed to create in-memory store"));
        let store = Arc::new(ReminderStore::new(kv));
        (store.clone(), ActionRecorder::new(store, limit))
    }

    #[tokio::test]
    async fn record_appends_entry_with_action_time() {
        let (store, recorder) = recorder(DEFAULT_HISTORY_LIMIT);
        let now = Utc::now();
        let id = MedicationId::from_str("m1");

        let entry = recorder
            .record(&id, "09:00".parse().unwrap(), ReminderAction::Skipped, now)
            .await
            .expect("record should succeed");

        assert_eq!(entry.action_time, now);
        assert_eq!(store.read_history().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn recording_past_limit_evicts_oldest_first() {
        let (store, recorder) = recorder(DEFAULT_HISTORY_LIMIT);
        let id = MedicationId::from_str("m1");
        let start = Utc::now();

        let mut first = None;
        for i in 0..=DEFAULT_HISTORY_LIMIT {
            let entry = recorder
                .record(
                    &id,
                    "08:00".parse().unwrap(),
                    ReminderAction::Taken,
                    start + Duration::seconds(i as i64),
                )
                .await
                .expect("record should succeed");
            if i == 0 {
                first = Some(entry);
            }
        }

        let history = store.read_history().await.unwrap();
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        let first = first.unwrap();
        assert!(history.iter().all(|h| h.id != first.id));
        assert_eq!(history[0].action_time, start + Duration::seconds(1));
        assert_eq!(
            history.last().unwrap().action_time,
            start + Duration::seconds(DEFAULT_HISTORY_LIMIT as i64)
        );
    }

    #[tokio::test]
    async fn small_limit_is_enforced_on_every_insert() {
        let (store, recorder) = recorder(3);
        let id = MedicationId::from_str("m1");
        for _ in 0..5 {
            recorder
                .record(&id, "08:00".parse().unwrap(), ReminderAction::Taken, Utc::now())
                .await
                .unwrap();
            assert!(store.read_history().await.unwrap().len() <= 3);
        }
    }

    #[tokio::test]
    async fn responses_for_unknown_medication_are_kept() {
        let (_, recorder) = recorder(DEFAULT_HISTORY_LIMIT);
        let deleted = MedicationId::from_str("deleted-long-ago");
        recorder
            .record(&deleted, "22:00".parse().unwrap(), ReminderAction::Taken, Utc::now())
            .await
            .unwrap();

        assert_eq!(recorder.history_for(&deleted).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_records_are_all_kept() {
        let (store, recorder) = recorder(DEFAULT_HISTORY_LIMIT);
        let recorder = Arc::new(recorder);

        let mut handles = Vec::new();
        for i in 0..25 {
            let recorder = Arc::clone(&recorder);
            handles.push(tokio::spawn(async move {
                recorder
                    .record(
                        &MedicationId::from_str(format!("m{i}")),
                        "12:00".parse().unwrap(),
                        ReminderAction::Taken,
                        Utc::now(),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read_history().await.unwrap().len(), 25);
    }
}
