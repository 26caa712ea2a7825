use chrono::Local;
use std::sync::Arc;
use tokio::sync::Mutex;
use trackmeds_common::{Clock, Medication, MedicationId, Result, TimeOfDay};
use trackmeds_db::ReminderStore;
use trackmeds_notify::{Notifier, TriggerBuilder, TriggerId, TriggerRecord, belongs_to};
use tracing::{debug, info, instrument};

/// Owns the lifecycle of every reminder trigger.
///
/// A medication is either disabled (no triggers) or scheduled (one daily
/// trigger per configured time), plus any number of pending one-shot snooze
/// triggers. All operations are serialized so a full rebuild cannot
/// interleave with an edit.
///
/// Errors from the notifier are returned as-is; there is no retry here. The
/// next [`Scheduler::reschedule_all`] repairs whatever a failed call left.
pub struct Scheduler {
    notifier: Arc<dyn Notifier>,
    store: Arc<ReminderStore>,
    builder: TriggerBuilder,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        store: Arc<ReminderStore>,
        builder: TriggerBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifier,
            store,
            builder,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Register one daily trigger per time. Disabled medications are skipped.
    /// Returns the number of triggers registered.
    #[instrument(skip_all, fields(medication_id = %medication.id))]
    pub async fn schedule(&self, medication: &Medication) -> Result<usize> {
        let _guard = self.lock.lock().await;
        self.schedule_locked(medication).await
    }

    /// Cancel everything the medication owns, then schedule it again.
    ///
    /// If registration fails partway the medication keeps whatever triggers
    /// were registered before the failure.
    #[instrument(skip_all, fields(medication_id = %medication.id))]
    pub async fn reschedule(&self, medication: &Medication) -> Result<usize> {
        let _guard = self.lock.lock().await;
        self.cancel_locked(&medication.id).await?;
        self.schedule_locked(medication).await
    }

    /// Cancel every trigger (daily and snooze) of a medication. Returns the
    /// number cancelled; zero is not an error.
    #[instrument(skip(self))]
    pub async fn cancel(&self, medication_id: &MedicationId) -> Result<usize> {
        let _guard = self.lock.lock().await;
        self.cancel_locked(medication_id).await
    }

    /// Rebuild the live trigger set from the stored medication list.
    pub async fn reschedule_all(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let medications = self.store.read_medications().await?;
        let enabled: Vec<&Medication> = medications.iter().filter(|m| m.enabled).collect();
        info!("rescheduling {} active medication(s)", enabled.len());

        self.notifier.cancel_all_triggers().await?;

        let mut registered = 0;
        for medication in enabled {
            registered += self.schedule_locked(medication).await?;
        }

        info!("all medications rescheduled ({registered} trigger(s))");
        Ok(registered)
    }

    /// Add a one-shot reminder for `original_time`. The daily trigger for
    /// that time is left alone.
    #[instrument(skip_all, fields(medication_id = %medication.id, time = %original_time))]
    pub async fn snooze(&self, medication: &Medication, original_time: TimeOfDay) -> Result<TriggerId> {
        let _guard = self.lock.lock().await;

        let request = self.builder.snooze(medication, original_time, &self.clock.now());
        let id = request.id.clone();
        self.notifier.register_trigger(request).await?;

        info!(
            "snoozed {} for {} minutes",
            medication.name,
            self.builder.snooze_minutes()
        );
        Ok(id)
    }

    /// Live triggers as reported by the notifier.
    pub async fn scheduled_triggers(&self) -> Result<Vec<TriggerRecord>> {
        self.notifier.list_triggers().await
    }

    async fn schedule_locked(&self, medication: &Medication) -> Result<usize> {
        if !medication.enabled {
            debug!("medication {} is disabled, skipping scheduling", medication.name);
            return Ok(0);
        }

        let now = self.clock.now().with_timezone(&Local);
        for time in &medication.times {
            let request = self.builder.daily(medication, *time, &now);
            self.notifier.register_trigger(request).await?;
        }

        info!(
            "scheduled {} reminder(s) for {}",
            medication.times.len(),
            medication.name
        );
        Ok(medication.times.len())
    }

    async fn cancel_locked(&self, medication_id: &MedicationId) -> Result<usize> {
        let live = self.notifier.list_triggers().await?;

        let mut cancelled = 0;
        for record in live.iter().filter(|r| belongs_to(r, medication_id)) {
            self.notifier.cancel_trigger(&record.id).await?;
            cancelled += 1;
        }

        debug!("cancelled {cancelled} trigger(s) for medication {medication_id}");
        Ok(cancelled)
    }
}
