pub mod error;
pub mod model;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use model::{Medication, ReminderAction, ReminderHistory, parse_times};
pub use time::{
    Clock, ManualClock, SNOOZE_MINUTES, SystemClock, TimeOfDay, next_occurrence,
    snooze_occurrence,
};
pub use types::{HistoryId, MedicationId};
