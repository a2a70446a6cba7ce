// Registration Workflow - validate, persist, reserve; all or nothing
//
// The registration row and the capacity reservation share one storage
// transaction. A duplicate email or a full shift rolls both back, and a
// transaction dropped mid-flight rolls back as well.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::core::validation::{parse_email, parse_phone, required};
use crate::core::{EmailAddress, RegistrationId, ShiftId};
use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::database::{StoreTransaction, VolunteerStore};
use crate::models::{Event, EventStatus, Permission, Registration, Shift};
use crate::services::capacity_ledger::CapacityLedger;
use crate::services::finish;
use crate::services::notifier::RegistrationNotifier;
use crate::services::organization_resolver::AdminContext;

/// Signup form input as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    Validating,
    Persisting,
    ReservingCapacity,
    Committed,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            RegistrationStage::Validating => "validating",
            RegistrationStage::Persisting => "persisting",
            RegistrationStage::ReservingCapacity => "reserving_capacity",
            RegistrationStage::Committed => "committed",
        };
        f.write_str(stage)
    }
}

struct ValidatedRegistration {
    name: String,
    email: EmailAddress,
    phone: Option<String>,
}

impl RegistrationRequest {
    fn validate(&self) -> AppResult<ValidatedRegistration> {
        Ok(ValidatedRegistration {
            name: required("name", &self.name)?,
            email: parse_email(&self.email)?,
            phone: parse_phone(self.phone.as_deref())?,
        })
    }
}

pub struct RegistrationWorkflow {
    store: Arc<dyn VolunteerStore>,
    ledger: CapacityLedger,
    notifier: Arc<dyn RegistrationNotifier>,
}

impl RegistrationWorkflow {
    pub fn new(
        store: Arc<dyn VolunteerStore>,
        ledger: CapacityLedger,
        notifier: Arc<dyn RegistrationNotifier>,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
        }
    }

    /// Register a volunteer for a shift.
    ///
    /// Outcomes besides success: `ValidationFailed`, `NotFound` (also when
    /// the shift is deleted mid-signup), `EventClosed`, `AlreadyRegistered`
    /// (same email, any case) and `ShiftFull`. On every failure `filled` is
    /// unchanged.
    #[instrument(skip(self, request), fields(stage))]
    pub async fn register(
        &self,
        shift_id: ShiftId,
        request: RegistrationRequest,
    ) -> AppResult<Registration> {
        log_stage(RegistrationStage::Validating);
        let input = request.validate()?;

        let shift = self
            .store
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shift {}", shift_id)))?;
        let event = self
            .store
            .get_event(shift.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", shift.event_id)))?;
        if event.status != EventStatus::Active {
            debug!(event_id = %event.id, status = %event.status, "Event is not accepting registrations");
            return Err(AppError::EventClosed);
        }

        let registration = Registration {
            id: RegistrationId::new(),
            shift_id,
            name: input.name,
            email: input.email,
            phone: input.phone,
            registered_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        let outcome = self.persist_and_reserve(tx.as_mut(), &registration).await;
        finish(tx, outcome).await?;

        log_stage(RegistrationStage::Committed);
        info!(
            registration_id = %registration.id,
            %shift_id,
            event_id = %event.id,
            "Volunteer registered"
        );

        self.notify(registration.clone(), shift, event);
        Ok(registration)
    }

    /// Remove a registration and give its spot back, in one transaction
    #[instrument(skip(self, ctx), fields(organization_id = %ctx.organization_id()))]
    pub async fn cancel_registration(
        &self,
        ctx: &AdminContext,
        registration_id: RegistrationId,
    ) -> AppResult<()> {
        ctx.require(Permission::ManageVolunteers)?;

        let registration = self
            .store
            .get_registration(registration_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("registration {}", registration_id)))?;
        let shift = self
            .store
            .get_shift(registration.shift_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shift {}", registration.shift_id)))?;
        let event = self
            .store
            .get_event(shift.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", shift.event_id)))?;
        ctx.ensure_owns(event.organization_id)?;

        let mut tx = self.store.begin().await?;
        let outcome = self
            .remove_and_release(tx.as_mut(), registration_id, shift.id)
            .await;
        finish(tx, outcome).await?;

        info!(%registration_id, shift_id = %shift.id, "Registration cancelled");
        Ok(())
    }

    async fn persist_and_reserve(
        &self,
        tx: &mut dyn StoreTransaction,
        registration: &Registration,
    ) -> AppResult<()> {
        log_stage(RegistrationStage::Persisting);
        match tx.insert_registration(registration).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => return Err(AppError::AlreadyRegistered),
            Err(StoreError::ForeignKeyViolation(_)) => {
                debug!(shift_id = %registration.shift_id, "Shift removed before the registration landed");
                return Err(AppError::NotFound(format!("shift {}", registration.shift_id)));
            }
            Err(err) => return Err(err.into()),
        }

        log_stage(RegistrationStage::ReservingCapacity);
        self.ledger.reserve_in(tx, registration.shift_id).await
    }

    async fn remove_and_release(
        &self,
        tx: &mut dyn StoreTransaction,
        registration_id: RegistrationId,
        shift_id: ShiftId,
    ) -> AppResult<()> {
        if !tx.delete_registration(registration_id).await? {
            return Err(AppError::NotFound(format!(
                "registration {}",
                registration_id
            )));
        }
        self.ledger.release_in(tx, shift_id).await
    }

    fn notify(&self, registration: Registration, shift: Shift, event: Event) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier
                .registration_committed(&registration, &shift, &event)
                .await
            {
                warn!(
                    registration_id = %registration.id,
                    error = %err,
                    "Registration notification failed"
                );
            }
        });
    }
}

fn log_stage(stage: RegistrationStage) {
    tracing::Span::current().record("stage", tracing::field::display(stage));
    debug!(%stage, "Registration stage");
}
