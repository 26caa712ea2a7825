pub mod builder;
pub mod identity;
pub mod local;
pub mod protocol;
pub mod traits;
pub mod trigger;

pub use builder::TriggerBuilder;
pub use identity::{SnoozeSequence, belongs_to, regular_id, snooze_id};
pub use local::LocalNotifier;
pub use protocol::{ActionId, NotifierEvent, PayloadData, ReminderPayload};
pub use traits::Notifier;
pub use trigger::{
    FireSpec, NotificationAction, NotificationContent, NotificationRequest, TriggerId,
    TriggerRecord,
};
