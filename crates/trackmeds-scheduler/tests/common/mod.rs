#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use trackmeds_common::{ManualClock, Medication, MedicationId, parse_times};
use trackmeds_config::AppConfig;
use trackmeds_db::{KeyValueStore, SqliteKvStore};
use trackmeds_notify::LocalNotifier;
use trackmeds_scheduler::{PromptSink, ReminderApp, ReminderPrompt};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub notifier: Arc<LocalNotifier>,
    pub clock: Arc<ManualClock>,
    pub prompts: Arc<RecordingPrompts>,
    pub app: ReminderApp,
}

pub fn harness() -> Harness {
    harness_with(AppConfig::default())
}

pub fn harness_with(config: AppConfig) -> Harness {
    let kv = Arc::new(SqliteKvStore::in_memory().expect("failed to create in-memory store"));
    build(config, kv)
}

/// A harness over a caller-supplied backing store.
pub fn harness_on(kv: Arc<dyn KeyValueStore>) -> Harness {
    build(AppConfig::default(), kv)
}

fn build(config: AppConfig, kv: Arc<dyn KeyValueStore>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("trackmeds=debug")
        .with_test_writer()
        .try_init();

    let notifier = Arc::new(LocalNotifier::new());
    let clock = Arc::new(ManualClock::new(start()));
    let prompts = Arc::new(RecordingPrompts::default());

    let app = ReminderApp::new(config, kv, notifier.clone(), clock.clone())
        .with_prompts(prompts.clone());

    Harness {
        notifier,
        clock,
        prompts,
        app,
    }
}

/// A medication with a fixed id so trigger ids are predictable.
pub fn medication(id: &str, times: &[&str]) -> Medication {
    let mut med = Medication::new("Aspirin", "100mg", parse_times(times).unwrap(), start())
        .expect("valid medication");
    med.id = MedicationId::from_str(id);
    med
}

#[derive(Default)]
pub struct RecordingPrompts {
    pub shown: Mutex<Vec<ReminderPrompt>>,
}

impl PromptSink for RecordingPrompts {
    fn present(&self, prompt: ReminderPrompt) {
        self.shown.lock().unwrap().push(prompt);
    }
}
