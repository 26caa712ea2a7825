pub mod kv_store;
pub mod migrations;
pub mod reminder_store;

pub use kv_store::{KeyValueStore, SqliteKvStore};
pub use reminder_store::{HISTORY_KEY, MEDICATIONS_KEY, ReminderStore};
