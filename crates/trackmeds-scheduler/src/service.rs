use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use trackmeds_common::{
    Clock, Error, Medication, MedicationId, ReminderHistory, Result, parse_times,
};
use trackmeds_db::ReminderStore;
use tracing::info;

use crate::scheduler::Scheduler;

/// Form input for a new medication. Times are raw `HH:MM` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub times: Vec<String>,
}

/// Fields to change on an existing medication; `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub times: Option<Vec<String>>,
}

/// Medication management as the UI drives it: every change is persisted
/// first and then reflected in the trigger schedule.
///
/// Mutations are serialized so the live triggers follow the order in which
/// changes were stored.
pub struct MedicationService {
    store: Arc<ReminderStore>,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    edit_lock: Mutex<()>,
}

impl MedicationService {
    pub fn new(store: Arc<ReminderStore>, scheduler: Arc<Scheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            scheduler,
            clock,
            edit_lock: Mutex::new(()),
        }
    }

    pub async fn add_medication(&self, input: NewMedication) -> Result<Medication> {
        let times = parse_times(&input.times)?;
        let medication = Medication::new(input.name, input.dosage, times, self.clock.now())?;

        let _guard = self.edit_lock.lock().await;
        self.store.add_medication(medication.clone()).await?;
        self.scheduler.schedule(&medication).await?;

        info!("added medication {} ({})", medication.name, medication.id);
        Ok(medication)
    }

    pub async fn update_medication(
        &self,
        id: &MedicationId,
        update: MedicationUpdate,
    ) -> Result<Medication> {
        let times = update.times.as_ref().map(parse_times).transpose()?;

        let _guard = self.edit_lock.lock().await;
        let medication = self
            .edit(id, move |medication| {
                if let Some(name) = update.name {
                    medication.name = name.trim().to_string();
                }
                if let Some(dosage) = update.dosage {
                    medication.dosage = dosage.trim().to_string();
                }
                if let Some(times) = times {
                    medication.times = times;
                }
            })
            .await?;
        self.scheduler.reschedule(&medication).await?;

        info!("updated medication {}", medication.id);
        Ok(medication)
    }

    /// Turn reminders on or off without touching the configured times.
    pub async fn set_enabled(&self, id: &MedicationId, enabled: bool) -> Result<Medication> {
        let _guard = self.edit_lock.lock().await;
        let medication = self
            .edit(id, |medication| medication.enabled = enabled)
            .await?;

        if enabled {
            self.scheduler.schedule(&medication).await?;
        } else {
            self.scheduler.cancel(&medication.id).await?;
        }

        info!(
            "{} reminders for {}",
            if enabled { "enabled" } else { "disabled" },
            medication.name
        );
        Ok(medication)
    }

    /// Delete the medication and every trigger it owns. Its history stays.
    pub async fn delete_medication(&self, id: &MedicationId) -> Result<()> {
        let _guard = self.edit_lock.lock().await;
        let existed = self.store.delete_medication(id).await?;
        self.scheduler.cancel(id).await?;

        if !existed {
            return Err(not_found(id));
        }
        info!("deleted medication {id}");
        Ok(())
    }

    /// A single stored medication. Storage failures are returned as-is.
    pub async fn medication(&self, id: &MedicationId) -> Result<Medication> {
        self.store
            .medication(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn medications(&self) -> Vec<Medication> {
        self.store.medications_or_empty().await
    }

    pub async fn history_for(&self, id: &MedicationId) -> Vec<ReminderHistory> {
        self.store.history_for_medication(id).await
    }

    /// Apply `change` to the stored record within one read-modify-write
    /// cycle. The record is replaced only if the changed copy is valid.
    async fn edit(
        &self,
        id: &MedicationId,
        change: impl FnOnce(&mut Medication),
    ) -> Result<Medication> {
        self.store
            .modify_medications(|medications| -> Result<Medication> {
                let slot = medications
                    .iter_mut()
                    .find(|m| &m.id == id)
                    .ok_or_else(|| not_found(id))?;
                let mut edited = slot.clone();
                change(&mut edited);
                edited.validate()?;
                *slot = edited.clone();
                Ok(edited)
            })
            .await?
    }
}

fn not_found(id: &MedicationId) -> Error {
    Error::NotFound(format!("medication {id}"))
}
