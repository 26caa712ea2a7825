use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use trackmeds_common::{
    Clock, Error, Medication, ReminderAction, ReminderHistory, Result, TimeOfDay,
};
use trackmeds_db::ReminderStore;
use trackmeds_notify::{ActionId, NotifierEvent, PayloadData, ReminderPayload};
use tracing::{debug, error, info, warn};

use crate::recorder::ActionRecorder;
use crate::scheduler::Scheduler;

/// Where an event was received. Only a foreground delivery opens the
/// in-app confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventContext {
    Foreground,
    Background,
}

/// A delivered reminder awaiting the user's answer in the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPrompt {
    pub medication: Medication,
    pub scheduled_time: TimeOfDay,
}

/// Receives confirmation prompts for display.
pub trait PromptSink: Send + Sync {
    fn present(&self, prompt: ReminderPrompt);
}

/// What the router did with one event.
#[derive(Debug)]
pub enum RouteOutcome {
    Prompted(ReminderPrompt),
    Recorded(ReminderHistory),
    /// Not a response (body tap, unknown action, background delivery, or an
    /// unknown medication on delivery).
    Ignored,
    /// The event could not be handled. Already logged.
    Dropped(Error),
}

/// Turns notifier events into prompts, snoozes, and history entries.
pub struct EventRouter {
    scheduler: Arc<Scheduler>,
    recorder: Arc<ActionRecorder>,
    store: Arc<ReminderStore>,
    clock: Arc<dyn Clock>,
    prompts: Option<Arc<dyn PromptSink>>,
}

impl EventRouter {
    pub fn new(
        scheduler: Arc<Scheduler>,
        recorder: Arc<ActionRecorder>,
        store: Arc<ReminderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            recorder,
            store,
            clock,
            prompts: None,
        }
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn PromptSink>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Handle one event. Never fails: problems are logged and reported as
    /// [`RouteOutcome::Dropped`].
    pub async fn dispatch(&self, event: NotifierEvent, context: EventContext) -> RouteOutcome {
        let result = match &event {
            NotifierEvent::Delivered { data, .. } => match context {
                EventContext::Foreground => self.on_delivered(data).await,
                EventContext::Background => Ok(RouteOutcome::Ignored),
            },
            NotifierEvent::Pressed { action_id, data }
            | NotifierEvent::ActionPressed { action_id, data } => {
                self.on_pressed(action_id.as_deref(), data).await
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(e @ Error::MalformedEvent(_)) => {
                warn!("dropping notification event: {e}");
                RouteOutcome::Dropped(e)
            }
            Err(e) => {
                error!("failed to handle notification event: {e}");
                RouteOutcome::Dropped(e)
            }
        }
    }

    /// Answer a prompt from the in-app dialog.
    pub async fn respond_to_prompt(
        &self,
        prompt: &ReminderPrompt,
        action: ReminderAction,
    ) -> Result<ReminderHistory> {
        if action == ReminderAction::Snoozed {
            self.scheduler
                .snooze(&prompt.medication, prompt.scheduled_time)
                .await?;
        }
        self.recorder
            .record(
                &prompt.medication.id,
                prompt.scheduled_time,
                action,
                self.clock.now(),
            )
            .await
    }

    /// Route every event from `events` until the sender is dropped.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<NotifierEvent>,
        context: EventContext,
    ) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        router.dispatch(event, context).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("event listener lagged, skipped {skipped} event(s)");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("notification event listener stopped");
        })
    }

    async fn on_delivered(&self, data: &PayloadData) -> Result<RouteOutcome> {
        let payload = ReminderPayload::from_data(data)?;

        let Some(medication) = self.store.medication(&payload.medication_id).await? else {
            debug!(
                "delivered reminder for unknown medication {}",
                payload.medication_id
            );
            return Ok(RouteOutcome::Ignored);
        };

        let prompt = ReminderPrompt {
            medication,
            scheduled_time: payload.scheduled_time,
        };
        if let Some(sink) = &self.prompts {
            sink.present(prompt.clone());
        }
        Ok(RouteOutcome::Prompted(prompt))
    }

    async fn on_pressed(&self, action_id: Option<&str>, data: &PayloadData) -> Result<RouteOutcome> {
        let payload = ReminderPayload::from_data(data)?;

        let raw_action = action_id.unwrap_or(ActionId::Default.as_str());
        let Some(action) = ActionId::parse(raw_action).and_then(|a| a.reminder_action()) else {
            debug!("ignoring press with action {raw_action:?}");
            return Ok(RouteOutcome::Ignored);
        };

        if action == ReminderAction::Snoozed {
            match self.store.medication(&payload.medication_id).await? {
                Some(medication) => {
                    self.scheduler
                        .snooze(&medication, payload.scheduled_time)
                        .await?;
                }
                None => warn!(
                    "medication {} not found, recording snooze without a follow-up reminder",
                    payload.medication_id
                ),
            }
        }

        let entry = self
            .recorder
            .record(
                &payload.medication_id,
                payload.scheduled_time,
                action,
                self.clock.now(),
            )
            .await?;
        info!(
            "handled {} for medication {}",
            raw_action, payload.medication_id
        );
        Ok(RouteOutcome::Recorded(entry))
    }
}
