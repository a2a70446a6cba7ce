// Services - organization resolution, capacity, registrations and admin workflows

pub mod capacity_ledger;
pub mod event_service;
pub mod notifier;
pub mod organization_resolver;
pub mod registration_workflow;
pub mod volunteer_directory;

pub use capacity_ledger::CapacityLedger;
pub use event_service::{EventAdminService, EventChanges, NewEvent, NewShift, ShiftChanges};
pub use notifier::{LoggingNotifier, RegistrationNotifier};
pub use organization_resolver::{
    AdminContext, OrganizationContext, OrganizationResolver, VolunteerContext,
};
pub use registration_workflow::{RegistrationRequest, RegistrationStage, RegistrationWorkflow};
pub use volunteer_directory::{VolunteerDirectory, VolunteerFilter};

use tracing::warn;

use crate::error::AppResult;
use crate::infrastructure::database::StoreTransaction;

/// Commit on success, roll back on failure. A failed rollback is only
/// logged; the transaction is discarded either way.
pub(crate) async fn finish<T>(
    tx: Box<dyn StoreTransaction>,
    outcome: AppResult<T>,
) -> AppResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
