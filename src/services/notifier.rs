// Registration notifier - post-commit collaborator for confirmation messages

use async_trait::async_trait;
use tracing::info;

use crate::models::{Event, Registration, Shift};

/// Called once a registration has committed. Delivery is best effort: the
/// registration stands whatever the notifier returns.
#[async_trait]
pub trait RegistrationNotifier: Send + Sync {
    async fn registration_committed(
        &self,
        registration: &Registration,
        shift: &Shift,
        event: &Event,
    ) -> anyhow::Result<()>;
}

/// Writes the confirmation to the log instead of sending it anywhere
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl RegistrationNotifier for LoggingNotifier {
    async fn registration_committed(
        &self,
        registration: &Registration,
        shift: &Shift,
        event: &Event,
    ) -> anyhow::Result<()> {
        info!(
            registration_id = %registration.id,
            email = %registration.email,
            event = %event.title,
            date = %event.date,
            shift = %shift.name,
            start = %shift.start_time,
            "Registration confirmed"
        );
        Ok(())
    }
}
