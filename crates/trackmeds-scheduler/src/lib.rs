pub mod app;
pub mod recorder;
pub mod router;
pub mod scheduler;
pub mod service;

pub use app::ReminderApp;
pub use recorder::{ActionRecorder, DEFAULT_HISTORY_LIMIT};
pub use router::{EventContext, EventRouter, PromptSink, ReminderPrompt, RouteOutcome};
pub use scheduler::Scheduler;
pub use service::{MedicationService, MedicationUpdate, NewMedication};
