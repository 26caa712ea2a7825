use std::sync::Arc;
use trackmeds_common::{Clock, Result};
use trackmeds_config::AppConfig;
use trackmeds_db::{KeyValueStore, ReminderStore};
use trackmeds_notify::{Notifier, TriggerBuilder};
use tracing::{error, info, warn};

use crate::recorder::ActionRecorder;
use crate::router::{EventRouter, PromptSink};
use crate::scheduler::Scheduler;
use crate::service::MedicationService;

/// The reminder services, wired together once at startup and shared by
/// handle with everything that needs them.
pub struct ReminderApp {
    pub config: AppConfig,
    pub store: Arc<ReminderStore>,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: Arc<Scheduler>,
    pub recorder: Arc<ActionRecorder>,
    pub router: Arc<EventRouter>,
    pub medications: MedicationService,
    clock: Arc<dyn Clock>,
}

impl ReminderApp {
    pub fn new(
        config: AppConfig,
        kv: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(ReminderStore::new(kv));
        let builder = TriggerBuilder::new(
            config.notifications.clone(),
            config.reminders.snooze_minutes,
        );
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&notifier),
            Arc::clone(&store),
            builder,
            Arc::clone(&clock),
        ));
        let recorder = Arc::new(ActionRecorder::new(
            Arc::clone(&store),
            config.reminders.history_limit,
        ));
        let router = Arc::new(EventRouter::new(
            Arc::clone(&scheduler),
            Arc::clone(&recorder),
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let medications =
            MedicationService::new(Arc::clone(&store), Arc::clone(&scheduler), Arc::clone(&clock));

        Self {
            config,
            store,
            notifier,
            scheduler,
            recorder,
            router,
            medications,
            clock,
        }
    }

    /// Route foreground deliveries to `prompts`.
    pub fn with_prompts(mut self, prompts: Arc<dyn PromptSink>) -> Self {
        self.router = Arc::new(
            EventRouter::new(
                Arc::clone(&self.scheduler),
                Arc::clone(&self.recorder),
                Arc::clone(&self.store),
                Arc::clone(&self.clock),
            )
            .with_prompts(prompts),
        );
        self
    }

    /// Prepare notifications and rebuild the schedule. Returns the number of
    /// triggers registered.
    ///
    /// A failed rebuild is logged and reported as zero registrations; the
    /// next [`ReminderApp::on_foreground`] tries again.
    pub async fn init(&self) -> Result<usize> {
        self.notifier.initialize(&self.config.notifications).await?;

        if !self.notifier.request_permission().await? {
            warn!("notification permission not granted");
        }

        let registered = match self.scheduler.reschedule_all().await {
            Ok(registered) => registered,
            Err(e) => {
                error!("failed to schedule reminders at startup: {e}");
                0
            }
        };
        info!(
            "reminders initialized via {} notifier",
            self.notifier.notifier_id()
        );
        Ok(registered)
    }

    /// The app came back to the foreground; rebuild the schedule in case
    /// triggers were dropped while it was away.
    pub async fn on_foreground(&self) -> Result<usize> {
        self.scheduler.reschedule_all().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.flush().await?;
        info!("reminder store flushed");
        Ok(())
    }
}
