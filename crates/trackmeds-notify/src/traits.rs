use async_trait::async_trait;
use trackmeds_common::Result;
use trackmeds_config::NotificationConfig;

use crate::trigger::{NotificationRequest, TriggerId, TriggerRecord};

/// The notification service that stores triggers and fires them.
///
/// Implementations must replace an existing trigger when a request with the
/// same id is registered, and `cancel_trigger` must succeed for unknown ids.
/// The scheduler relies on both to stay idempotent without a side index.
/// Any failure to reach the service is reported as
/// [`trackmeds_common::Error::CollaboratorUnavailable`].
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier for logs (e.g. "local").
    fn notifier_id(&self) -> &str;

    /// Create the delivery channel and the category holding the response
    /// buttons.
    async fn initialize(&self, _config: &NotificationConfig) -> Result<()> {
        Ok(())
    }

    /// Ask the platform for permission to show notifications.
    async fn request_permission(&self) -> Result<bool> {
        Ok(true)
    }

    async fn register_trigger(&self, request: NotificationRequest) -> Result<()>;

    async fn list_triggers(&self) -> Result<Vec<TriggerRecord>>;

    async fn cancel_trigger(&self, id: &TriggerId) -> Result<()>;

    async fn cancel_all_triggers(&self) -> Result<()>;
}
