use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use trackmeds_common::{Error, Medication, MedicationId, ReminderHistory, Result};
use tracing::{debug, warn};

use crate::kv_store::KeyValueStore;

pub const MEDICATIONS_KEY: &str = "@medications";
pub const HISTORY_KEY: &str = "@reminder_history";

/// Typed access to the medication list and reminder history.
///
/// Both collections are stored as whole JSON blobs. Every mutation is a
/// read-modify-write cycle, so each collection has its own async lock and
/// mutations of the same collection never interleave.
pub struct ReminderStore {
    kv: Arc<dyn KeyValueStore>,
    medications_lock: Mutex<()>,
    history_lock: Mutex<()>,
}

impl ReminderStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            medications_lock: Mutex::new(()),
            history_lock: Mutex::new(()),
        }
    }

    pub async fn read_medications(&self) -> Result<Vec<Medication>> {
        self.read_collection(MEDICATIONS_KEY).await
    }

    pub async fn write_medications(&self, medications: &[Medication]) -> Result<()> {
        let _guard = self.medications_lock.lock().await;
        self.write_collection(MEDICATIONS_KEY, medications).await
    }

    pub async fn read_history(&self) -> Result<Vec<ReminderHistory>> {
        self.read_collection(HISTORY_KEY).await
    }

    pub async fn write_history(&self, history: &[ReminderHistory]) -> Result<()> {
        let _guard = self.history_lock.lock().await;
        self.write_collection(HISTORY_KEY, history).await
    }

    /// Apply `f` to the medication list and persist the result.
    ///
    /// A failed read aborts the cycle instead of writing over the stored list.
    pub async fn modify_medications<T>(
        &self,
        f: impl FnOnce(&mut Vec<Medication>) -> T,
    ) -> Result<T> {
        let _guard = self.medications_lock.lock().await;
        let mut medications = self.read_collection(MEDICATIONS_KEY).await?;
        let out = f(&mut medications);
        self.write_collection(MEDICATIONS_KEY, &medications).await?;
        Ok(out)
    }

    /// Apply `f` to the history log and persist the result.
    pub async fn modify_history<T>(
        &self,
        f: impl FnOnce(&mut Vec<ReminderHistory>) -> T,
    ) -> Result<T> {
        let _guard = self.history_lock.lock().await;
        let mut history = self.read_collection(HISTORY_KEY).await?;
        let out = f(&mut history);
        self.write_collection(HISTORY_KEY, &history).await?;
        Ok(out)
    }

    pub async fn add_medication(&self, medication: Medication) -> Result<()> {
        self.modify_medications(|meds| meds.push(medication)).await
    }

    /// Replace the stored record with the same id. Returns `false` (and
    /// writes nothing new) when no such medication exists.
    pub async fn update_medication(&self, medication: Medication) -> Result<bool> {
        self.modify_medications(|meds| {
            match meds.iter_mut().find(|m| m.id == medication.id) {
                Some(slot) => {
                    *slot = medication;
                    true
                }
                None => false,
            }
        })
        .await
    }

    /// Remove a medication by id. Returns `false` if it was not stored.
    pub async fn delete_medication(&self, id: &MedicationId) -> Result<bool> {
        self.modify_medications(|meds| {
            let before = meds.len();
            meds.retain(|m| &m.id != id);
            meds.len() != before
        })
        .await
    }

    pub async fn medication(&self, id: &MedicationId) -> Result<Option<Medication>> {
        let medications = self.read_medications().await?;
        Ok(medications.into_iter().find(|m| &m.id == id))
    }

    /// Medication list for display; a read failure yields an empty list.
    pub async fn medications_or_empty(&self) -> Vec<Medication> {
        self.read_medications().await.unwrap_or_else(|e| {
            warn!("failed to read medications: {e}");
            Vec::new()
        })
    }

    /// History log for display; a read failure yields an empty list.
    pub async fn history_or_empty(&self) -> Vec<ReminderHistory> {
        self.read_history().await.unwrap_or_else(|e| {
            warn!("failed to read reminder history: {e}");
            Vec::new()
        })
    }

    /// Entries for one medication, in insertion order.
    pub async fn history_for_medication(&self, id: &MedicationId) -> Vec<ReminderHistory> {
        self.history_or_empty()
            .await
            .into_iter()
            .filter(|h| &h.medication_id == id)
            .collect()
    }

    /// Drop both collections.
    pub async fn clear_all(&self) -> Result<()> {
        let _meds = self.medications_lock.lock().await;
        let _history = self.history_lock.lock().await;
        self.kv.remove(&[MEDICATIONS_KEY, HISTORY_KEY]).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.kv.flush().await
    }

    async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.kv.get(key).await? {
            Some(blob) => serde_json::from_str(&blob)
                .map_err(|e| Error::Storage(format!("corrupt {key} blob: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    async fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        let blob = serde_json::to_string(items)?;
        self.kv.set(key, &blob).await?;
        debug!("wrote {} item(s) to {key}", items.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{HISTORY_KEY, MEDICATIONS_KEY, ReminderStore};
    use crate::kv_store::{KeyValueStore, SqliteKvStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;
    use trackmeds_common::{
        Error, Medication, MedicationId, ReminderAction, ReminderHistory, Result, parse_times,
    };

    fn store() -> (Arc<SqliteKvStore>, ReminderStore) {
        let kv = Arc::new(SqliteKvStore::in_memory().expect("failed to create in-memory store"));
        let store = ReminderStore::new(kv.clone());
        (kv, store)
    }

    fn medication(name: &str, times: &[&str]) -> Medication {
        Medication::new(name, "1 tablet", parse_times(times).unwrap(), Utc::now()).unwrap()
    }

    fn history(id: &MedicationId, time: &str, action: ReminderAction) -> ReminderHistory {
        ReminderHistory::new(id.clone(), time.parse().unwrap(), action, Utc::now())
    }

    #[tokio::test]
    async fn empty_store_reads_as_empty_collections() {
        let (_, store) = store();
        assert!(store.read_medications().await.unwrap().is_empty());
        assert!(store.read_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_update_delete_medication() {
        let (_, store) = store();
        let mut med = medication("Aspirin", &["09:00"]);
        store.add_medication(med.clone()).await.unwrap();

        med.dosage = "2 tablets".to_string();
        assert!(store.update_medication(med.clone()).await.unwrap());
        let loaded = store.medication(&med.id).await.unwrap().unwrap();
        assert_eq!(loaded.dosage, "2 tablets");

        assert!(store.delete_medication(&med.id).await.unwrap());
        assert!(!store.delete_medication(&med.id).await.unwrap());
        assert!(store.medication(&med.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_unknown_medication_is_reported() {
        let (_, store) = store();
        let med = medication("Ghost", &["10:00"]);
        assert!(!store.update_medication(med).await.unwrap());
        assert!(store.read_medications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_for_medication_filters_in_insertion_order() {
        let (_, store) = store();
        let a = MedicationId::from_str("a");
        let b = MedicationId::from_str("b");
        let entries = vec![
            history(&a, "09:00", ReminderAction::Taken),
            history(&b, "09:00", ReminderAction::Skipped),
            history(&a, "21:00", ReminderAction::Snoozed),
        ];
        store.write_history(&entries).await.unwrap();

        let for_a = store.history_for_medication(&a).await;
        assert_eq!(for_a, vec![entries[0].clone(), entries[2].clone()]);
    }

    #[tokio::test]
    async fn corrupt_blob_degrades_to_empty_on_read_path() {
        let (kv, store) = store();
        kv.set(MEDICATIONS_KEY, "not json").await.unwrap();

        assert!(matches!(
            store.read_medications().await,
            Err(Error::Storage(_))
        ));
        assert!(store.medications_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_blob_aborts_write_path() {
        let (kv, store) = store();
        kv.set(HISTORY_KEY, "{broken").await.unwrap();

        let result = store
            .modify_history(|h| h.push(history(&MedicationId::from_str("m"), "08:00", ReminderAction::Taken)))
            .await;

        assert!(result.is_err());
        assert_eq!(kv.get(HISTORY_KEY).await.unwrap().as_deref(), Some("{broken"));
    }

    #[tokio::test]
    async fn clear_all_removes_both_collections() {
        let (kv, store) = store();
        let med = medication("Aspirin", &["09:00"]);
        store.add_medication(med.clone()).await.unwrap();
        store
            .modify_history(|h| h.push(history(&med.id, "09:00", ReminderAction::Taken)))
            .await
            .unwrap();

        store.clear_all().await.unwrap();

        assert!(kv.get(MEDICATIONS_KEY).await.unwrap().is_none());
        assert!(kv.get(HISTORY_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_adds_are_not_lost() {
        let (_, store) = store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add_medication(medication(&format!("med-{i}"), &["08:00"]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read_medications().await.unwrap().len(), 20);
    }

    struct FailingKv;

    #[async_trait]
    impl KeyValueStore for FailingKv {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("disk unavailable".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("disk unavailable".into()))
        }

        async fn remove(&self, _keys: &[&str]) -> Result<()> {
            Err(Error::Storage("disk unavailable".into()))
        }
    }

    #[tokio::test]
    async fn failing_backend_degrades_reads_and_fails_writes() {
        let store = ReminderStore::new(Arc::new(FailingKv));

        assert!(store.medications_or_empty().await.is_empty());
        assert!(store.history_or_empty().await.is_empty());
        assert!(
            store
                .history_for_medication(&MedicationId::from_str("m"))
                .await
                .is_empty()
        );
        assert!(store.add_medication(medication("X", &["01:00"])).await.is_err());
    }
}
