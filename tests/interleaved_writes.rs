mod common;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};

use common::*;
use volunteer_hub::app_state::AppState;
use volunteer_hub::config::Config;
use volunteer_hub::core::{
    EmailAddress, EventId, OrganizationId, RegistrationId, ShiftId, UserId,
};
use volunteer_hub::error::StoreResult;
use volunteer_hub::infrastructure::{
    SqliteDatabase, Storage, StoreTransaction, VolunteerStore,
};
use volunteer_hub::models::{
    AdminRole, DeletionImpact, Event, PermissionSet, Registration, Shift, VolunteerRecord,
};
use volunteer_hub::services::{AdminContext, LoggingNotifier};
use volunteer_hub::AppError;

/// A write another request commits after the service's pre-checks and
/// before its transaction opens
enum Interleave {
    Signup(Registration),
    AddShift(Shift),
    RemoveShift(ShiftId),
}

struct InterleavingStore {
    inner: Arc<SqliteDatabase>,
    pending: Mutex<Option<Interleave>>,
}

impl InterleavingStore {
    fn arm(&self, write: Interleave) {
        *self.pending.lock().unwrap() = Some(write);
    }

    async fn run_pending(&self) -> StoreResult<()> {
        let pending = self.pending.lock().unwrap().take();
        match pending {
            None => {}
            Some(Interleave::Signup(registration)) => {
                let mut tx = self.inner.begin().await?;
                tx.insert_registration(&registration).await?;
                assert!(tx.try_reserve_spot(registration.shift_id).await?);
                tx.commit().await?;
            }
            Some(Interleave::AddShift(shift)) => self.inner.insert_shift(&shift).await?,
            Some(Interleave::RemoveShift(shift_id)) => {
                let mut tx = self.inner.begin().await?;
                assert!(tx.delete_shift(shift_id).await?);
                tx.commit().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VolunteerStore for InterleavingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.run_pending().await?;
        self.inner.begin().await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        self.inner.insert_event(event).await
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        self.inner.get_event(id).await
    }

    async fn get_event_by_slug(&self, slug: &str) -> StoreResult<Option<Event>> {
        self.inner.get_event_by_slug(slug).await
    }

    async fn update_event(&self, event: &Event) -> StoreResult<bool> {
        self.inner.update_event(event).await
    }

    async fn list_events(&self, organization_id: OrganizationId) -> StoreResult<Vec<Event>> {
        self.inner.list_events(organization_id).await
    }

    async fn insert_shift(&self, shift: &Shift) -> StoreResult<()> {
        self.inner.insert_shift(shift).await
    }

    async fn get_shift(&self, id: ShiftId) -> StoreResult<Option<Shift>> {
        self.inner.get_shift(id).await
    }

    async fn list_shifts(&self, event_id: EventId) -> StoreResult<Vec<Shift>> {
        self.inner.list_shifts(event_id).await
    }

    async fn try_reserve_spot(&self, shift_id: ShiftId) -> StoreResult<bool> {
        self.inner.try_reserve_spot(shift_id).await
    }

    async fn release_spot(&self, shift_id: ShiftId) -> StoreResult<bool> {
        self.inner.release_spot(shift_id).await
    }

    async fn try_resize_capacity(&self, shift_id: ShiftId, capacity: i32) -> StoreResult<bool> {
        self.inner.try_resize_capacity(shift_id, capacity).await
    }

    async fn get_registration(&self, id: RegistrationId) -> StoreResult<Option<Registration>> {
        self.inner.get_registration(id).await
    }

    async fn count_registrations(&self, shift_id: ShiftId) -> StoreResult<u64> {
        self.inner.count_registrations(shift_id).await
    }

    async fn list_volunteers(
        &self,
        organization_id: OrganizationId,
    ) -> StoreResult<Vec<VolunteerRecord>> {
        self.inner.list_volunteers(organization_id).await
    }
}

struct Setup {
    db: Arc<SqliteDatabase>,
    store: Arc<InterleavingStore>,
    state: AppState,
    ctx: AdminContext,
}

async fn setup() -> Setup {
    let db = Arc::new(SqliteDatabase::new_in_memory().await.unwrap());
    let store = Arc::new(InterleavingStore {
        inner: db.clone(),
        pending: Mutex::new(None),
    });
    let storage = Storage {
        memberships: db.clone(),
        volunteers: store.clone(),
    };
    let state = AppState::from_storage(Config::default(), storage, Arc::new(LoggingNotifier));

    let organization = seed_organization(&db, "Harbor Food Bank").await;
    let user = UserId::new();
    grant_admin(&db, user, organization.id, AdminRole::Owner, PermissionSet::new(), 0).await;
    let ctx = state.resolver.require_admin(user).await.unwrap();

    Setup {
        db,
        store,
        state,
        ctx,
    }
}

fn late_registration(shift_id: ShiftId) -> Registration {
    Registration {
        id: RegistrationId::new(),
        shift_id,
        name: "Late Volunteer".into(),
        email: EmailAddress::normalized("late@x.com"),
        phone: None,
        registered_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_signup_landing_before_shift_delete_still_needs_confirmation() {
    let s = setup().await;
    let events = &s.state.events;
    let event = events.create_event(&s.ctx, new_event("late-signup")).await.unwrap();
    let shift = events.create_shift(&s.ctx, event.id, new_shift(1, 5)).await.unwrap();
    assert_eq!(events.shift_impact(&s.ctx, shift.id).await.unwrap().registrations, 0);

    let registration = late_registration(shift.id);
    s.store.arm(Interleave::Signup(registration.clone()));

    let result = events.delete_shift(&s.ctx, shift.id, false).await;
    assert!(matches!(
        result,
        Err(AppError::ConfirmationRequired { registrations: 1 })
    ));
    assert!(s.db.get_shift(shift.id).await.unwrap().is_some());
    assert!(s.db.get_registration(registration.id).await.unwrap().is_some());

    let impact = events.delete_shift(&s.ctx, shift.id, true).await.unwrap();
    assert_eq!(
        impact,
        DeletionImpact {
            shifts: 1,
            registrations: 1
        }
    );
    assert!(s.db.get_registration(registration.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_signup_landing_before_event_delete_still_needs_confirmation() {
    let s = setup().await;
    let events = &s.state.events;
    let event = events.create_event(&s.ctx, new_event("late-event-signup")).await.unwrap();
    let shift = events.create_shift(&s.ctx, event.id, new_shift(1, 5)).await.unwrap();

    s.store.arm(Interleave::Signup(late_registration(shift.id)));

    let result = events.delete_event(&s.ctx, event.id, false).await;
    assert!(matches!(
        result,
        Err(AppError::ConfirmationRequired { registrations: 1 })
    ));
    assert!(s.db.get_event(event.id).await.unwrap().is_some());
    assert_eq!(s.db.count_registrations(shift.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_shift_added_before_event_delete_is_removed_with_it() {
    let s = setup().await;
    let events = &s.state.events;
    let event = events.create_event(&s.ctx, new_event("late-shift")).await.unwrap();
    let first = events.create_shift(&s.ctx, event.id, new_shift(1, 5)).await.unwrap();

    let added = Shift {
        id: ShiftId::new(),
        ordinal: 2,
        created_at: Utc::now(),
        ..first.clone()
    };
    s.store.arm(Interleave::AddShift(added.clone()));

    let impact = events.delete_event(&s.ctx, event.id, false).await.unwrap();
    assert_eq!(
        impact,
        DeletionImpact {
            shifts: 2,
            registrations: 0
        }
    );
    assert!(s.db.get_event(event.id).await.unwrap().is_none());
    assert!(s.db.get_shift(added.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_shift_deleted_mid_signup_is_not_found() {
    let s = setup().await;
    let events = &s.state.events;
    let event = events.create_event(&s.ctx, new_event("vanishing-shift")).await.unwrap();
    let shift = events.create_shift(&s.ctx, event.id, new_shift(1, 5)).await.unwrap();

    s.store.arm(Interleave::RemoveShift(shift.id));

    let result = s
        .state
        .registrations
        .register(shift.id, signup("Ada", "ada@example.org"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(s
        .db
        .list_volunteers(s.ctx.organization_id())
        .await
        .unwrap()
        .is_empty());
}
