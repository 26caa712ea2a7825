use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use trackmeds_common::{Clock, MedicationId, TimeOfDay};
use trackmeds_notify::{ActionId, LocalNotifier, NotifierEvent, ReminderPayload};
use trackmeds_scheduler::{EventContext, PromptSink, ReminderApp, ReminderPrompt, RouteOutcome};
use tracing::{info, warn};

/// Prints foreground reminders to the terminal.
pub struct ConsolePrompts;

impl PromptSink for ConsolePrompts {
    fn present(&self, prompt: ReminderPrompt) {
        println!(
            "\n>> {} ({}) - reply: confirm|snooze|skip {} {}",
            prompt.medication.summary(),
            prompt.scheduled_time,
            prompt.medication.id,
            prompt.scheduled_time
        );
    }
}

/// A button press for the reminder of `medication_id` at `time`.
pub async fn response_event(
    app: &ReminderApp,
    medication_id: &MedicationId,
    time: TimeOfDay,
    action: ActionId,
) -> NotifierEvent {
    let known = app.medications.medication(medication_id).await.ok();
    let payload = ReminderPayload {
        medication_id: medication_id.clone(),
        medication_name: known.as_ref().map(|m| m.name.clone()).unwrap_or_default(),
        dosage: known.map(|m| m.dosage).unwrap_or_default(),
        scheduled_time: time,
        is_snoozed: false,
    };
    NotifierEvent::ActionPressed {
        action_id: Some(action.as_str().to_string()),
        data: payload.to_data(),
    }
}

pub fn describe(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Prompted(prompt) => format!(
            "reminder shown for {} at {}",
            prompt.medication.name, prompt.scheduled_time
        ),
        RouteOutcome::Recorded(entry) => format!(
            "recorded {} for {} at {}",
            entry.action, entry.medication_id, entry.scheduled_time
        ),
        RouteOutcome::Ignored => "nothing to record".to_string(),
        RouteOutcome::Dropped(e) => format!("not handled: {e}"),
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Run the reminder loop until stdin closes, `quit` is typed, or Ctrl-C.
pub async fn run(
    app: &ReminderApp,
    notifier: Arc<LocalNotifier>,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    let registered = app.init().await?;
    println!(
        "Watching {registered} reminder(s). Commands: confirm|snooze|skip <id> <HH:MM>, foreground, quit"
    );

    let listener = app
        .router
        .spawn_listener(notifier.subscribe(), EventContext::Foreground);

    let mut ticker = tokio::time::interval(Duration::from_secs(
        app.config.reminders.poll_interval_secs,
    ));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match notifier.deliver_due(clock.now()) {
                    Ok(due) if !due.is_empty() => info!("delivered {} reminder(s)", due.len()),
                    Ok(_) => {}
                    Err(e) => warn!("reminder delivery failed: {e}"),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Flow::Quit = handle_line(app, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    listener.abort();
    info!("watch stopped");
    Ok(())
}

async fn handle_line(app: &ReminderApp, line: &str) -> Flow {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => {}
        ["quit"] | ["exit"] => return Flow::Quit,
        ["foreground"] => match app.on_foreground().await {
            Ok(n) => println!("rescheduled {n} reminder(s)"),
            Err(e) => println!("reschedule failed: {e}"),
        },
        [action, id, time] => {
            let Some(action) = ActionId::parse(action).filter(|a| a.reminder_action().is_some())
            else {
                println!("unknown response {action:?}; use confirm, snooze, or skip");
                return Flow::Continue;
            };
            let time: TimeOfDay = match time.parse() {
                Ok(time) => time,
                Err(e) => {
                    println!("{e}");
                    return Flow::Continue;
                }
            };
            let event = response_event(app, &MedicationId::from_str(*id), time, action).await;
            let outcome = app.router.dispatch(event, EventContext::Foreground).await;
            println!("{}", describe(&outcome));
        }
        _ => println!("expected: confirm|snooze|skip <id> <HH:MM>, foreground, or quit"),
    }
    Flow::Continue
}
