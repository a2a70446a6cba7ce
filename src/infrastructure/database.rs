// Database Interface - storage boundary for memberships, events, shifts and registrations
// Capacity changes are expressed as single conditional statements so the
// check and the write can never be split across two round trips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::core::{EventId, OrganizationId, RegistrationId, ShiftId, UserId};
use crate::error::{StoreError, StoreResult};
use crate::infrastructure::postgres_database::PostgresDatabase;
use crate::infrastructure::sqlite_database::SqliteDatabase;
use crate::models::{
    AdminMembership, Event, Organization, Registration, Shift, VolunteerMembership,
    VolunteerRecord,
};

/// Organizations, memberships and the per-user organization selection.
/// Everything the organization resolver reads goes through here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn create_organization(&self, organization: &Organization) -> StoreResult<()>;
    async fn get_organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>>;

    async fn add_admin_membership(&self, membership: &AdminMembership) -> StoreResult<()>;
    /// Admin memberships ordered by creation time, then organization id
    async fn admin_memberships(&self, user_id: UserId) -> StoreResult<Vec<AdminMembership>>;

    async fn add_volunteer_membership(&self, membership: &VolunteerMembership) -> StoreResult<()>;
    /// Earliest active volunteer membership, if any
    async fn active_volunteer_membership(
        &self,
        user_id: UserId,
    ) -> StoreResult<Option<VolunteerMembership>>;

    async fn record_selection(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        selected_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn latest_selection(&self, user_id: UserId) -> StoreResult<Option<OrganizationId>>;
}

/// Events, shifts and registrations
#[async_trait]
pub trait VolunteerStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
    async fn health_check(&self) -> StoreResult<()>;

    async fn insert_event(&self, event: &Event) -> StoreResult<()>;
    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>>;
    async fn get_event_by_slug(&self, slug: &str) -> StoreResult<Option<Event>>;
    /// Updates everything except id, organization and slug
    async fn update_event(&self, event: &Event) -> StoreResult<bool>;
    /// Events of an organization ordered by date
    async fn list_events(&self, organization_id: OrganizationId) -> StoreResult<Vec<Event>>;

    async fn insert_shift(&self, shift: &Shift) -> StoreResult<()>;
    async fn get_shift(&self, id: ShiftId) -> StoreResult<Option<Shift>>;
    /// Shifts of an event ordered by ordinal
    async fn list_shifts(&self, event_id: EventId) -> StoreResult<Vec<Shift>>;

    /// `filled += 1` only while `filled < capacity`; false when nothing was updated
    async fn try_reserve_spot(&self, shift_id: ShiftId) -> StoreResult<bool>;
    /// `filled -= 1` only while `filled > 0`; false when nothing was updated
    async fn release_spot(&self, shift_id: ShiftId) -> StoreResult<bool>;
    /// Sets capacity only while `filled <= capacity`; false when nothing was updated
    async fn try_resize_capacity(&self, shift_id: ShiftId, capacity: i32) -> StoreResult<bool>;

    async fn get_registration(&self, id: RegistrationId) -> StoreResult<Option<Registration>>;
    async fn count_registrations(&self, shift_id: ShiftId) -> StoreResult<u64>;
    /// Registrations for every shift of the organization's events, newest first
    async fn list_volunteers(
        &self,
        organization_id: OrganizationId,
    ) -> StoreResult<Vec<VolunteerRecord>>;
}

/// Unit of work spanning several writes. Dropping it without `commit`
/// rolls everything back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Hold the shift against concurrent signups until the transaction ends;
    /// false when the shift does not exist
    async fn lock_shift(&mut self, shift_id: ShiftId) -> StoreResult<bool>;
    /// Hold the event and its shifts against concurrent edits and signups
    /// until the transaction ends; false when the event does not exist
    async fn lock_event(&mut self, event_id: EventId) -> StoreResult<bool>;

    async fn get_shift(&mut self, id: ShiftId) -> StoreResult<Option<Shift>>;
    /// Updates ordinal, name, description and times; never capacity or filled
    async fn update_shift_details(&mut self, shift: &Shift) -> StoreResult<bool>;
    async fn try_reserve_spot(&mut self, shift_id: ShiftId) -> StoreResult<bool>;
    async fn release_spot(&mut self, shift_id: ShiftId) -> StoreResult<bool>;
    async fn try_resize_capacity(&mut self, shift_id: ShiftId, capacity: i32)
        -> StoreResult<bool>;

    async fn insert_registration(&mut self, registration: &Registration) -> StoreResult<()>;
    async fn delete_registration(&mut self, id: RegistrationId) -> StoreResult<bool>;
    async fn count_registrations(&mut self, shift_id: ShiftId) -> StoreResult<u64>;
    /// Registrations across every shift of the event
    async fn count_event_registrations(&mut self, event_id: EventId) -> StoreResult<u64>;
    async fn delete_registrations_for_shift(&mut self, shift_id: ShiftId) -> StoreResult<u64>;
    async fn delete_registrations_for_event(&mut self, event_id: EventId) -> StoreResult<u64>;
    async fn delete_shift(&mut self, shift_id: ShiftId) -> StoreResult<bool>;
    async fn delete_shifts_for_event(&mut self, event_id: EventId) -> StoreResult<u64>;
    async fn delete_event(&mut self, event_id: EventId) -> StoreResult<bool>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Both storage views over one backend
#[derive(Clone)]
pub struct Storage {
    pub memberships: Arc<dyn MembershipRepository>,
    pub volunteers: Arc<dyn VolunteerStore>,
}

impl Storage {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: MembershipRepository + VolunteerStore + 'static,
    {
        Self {
            memberships: backend.clone(),
            volunteers: backend,
        }
    }
}

/// Connect to the backend named by the URL scheme and make sure the schema exists
pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Storage> {
    if url.starts_with("sqlite:") {
        let db = SqliteDatabase::connect(url, max_connections).await?;
        info!(backend = "sqlite", "Storage initialized");
        Ok(Storage::from_backend(Arc::new(db)))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let db = PostgresDatabase::connect(url, max_connections).await?;
        info!(backend = "postgres", max_connections, "Storage initialized");
        Ok(Storage::from_backend(Arc::new(db)))
    } else {
        Err(StoreError::Configuration(format!(
            "unsupported database url scheme: {}",
            url.split(':').next().unwrap_or_default()
        )))
    }
}
