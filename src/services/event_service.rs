// Event administration - events, shifts and confirm-before-delete cascades
// scoped to the caller's resolved organization

use chrono::{NaiveDate, NaiveTime, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::validation::{optional, parse_capacity, parse_slug, required};
use crate::core::{EventId, ShiftId};
use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::database::{StoreTransaction, VolunteerStore};
use crate::models::{
    DeletionImpact, Event, EventStatus, EventWithShifts, Permission, PublicEvent, Shift,
};
use crate::services::capacity_ledger::CapacityLedger;
use crate::services::finish;
use crate::services::organization_resolver::AdminContext;

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Editable event fields. The slug is fixed at creation and cannot be changed.
#[derive(Debug, Clone, Deserialize)]
pub struct EventChanges {
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShift {
    pub ordinal: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
}

/// Full replacement of a shift's editable fields, capacity included
pub type ShiftChanges = NewShift;

struct ShiftFields {
    ordinal: i32,
    name: String,
    description: Option<String>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    capacity: i32,
}

impl NewShift {
    fn validate(&self) -> AppResult<ShiftFields> {
        if self.ordinal < 1 {
            return Err(AppError::validation("ordinal", "must be at least 1"));
        }
        if self.end_time <= self.start_time {
            return Err(AppError::validation(
                "end_time",
                "must be after the start time",
            ));
        }
        Ok(ShiftFields {
            ordinal: self.ordinal,
            name: required("name", &self.name)?,
            description: optional(self.description.as_deref()),
            start_time: self.start_time,
            end_time: self.end_time,
            capacity: parse_capacity(self.capacity)?,
        })
    }
}

pub struct EventAdminService {
    store: Arc<dyn VolunteerStore>,
    ledger: CapacityLedger,
}

impl EventAdminService {
    pub fn new(store: Arc<dyn VolunteerStore>, ledger: CapacityLedger) -> Self {
        Self { store, ledger }
    }

    /// Events of the context organization by date, each with its shifts in
    /// ordinal order and the derived capacity totals
    #[instrument(skip(self, ctx), fields(organization_id = %ctx.organization_id()))]
    pub async fn list_events(&self, ctx: &AdminContext) -> AppResult<Vec<EventWithShifts>> {
        let events = self.store.list_events(ctx.organization_id()).await?;
        let shifts = try_join_all(events.iter().map(|e| self.store.list_shifts(e.id))).await?;

        Ok(events
            .into_iter()
            .zip(shifts)
            .map(|(event, shifts)| EventWithShifts::new(event, shifts))
            .collect())
    }

    #[instrument(skip(self, ctx, input), fields(organization_id = %ctx.organization_id()))]
    pub async fn create_event(&self, ctx: &AdminContext, input: NewEvent) -> AppResult<Event> {
        ctx.require(Permission::ManageEvents)?;

        let event = Event {
            id: EventId::new(),
            organization_id: ctx.organization_id(),
            slug: parse_slug(&input.slug)?,
            title: required("title", &input.title)?,
            date: input.date,
            time: required("time", &input.time)?,
            location: required("location", &input.location)?,
            description: optional(input.description.as_deref()),
            image_url: optional(input.image_url.as_deref()),
            status: EventStatus::Active,
            created_at: Utc::now(),
        };

        self.store.insert_event(&event).await.map_err(|err| {
            conflict_on_unique(err, format!("an event with slug '{}' already exists", event.slug))
        })?;

        info!(event_id = %event.id, slug = %event.slug, "Event created");
        Ok(event)
    }

    #[instrument(skip(self, ctx, changes), fields(organization_id = %ctx.organization_id()))]
    pub async fn update_event(
        &self,
        ctx: &AdminContext,
        event_id: EventId,
        changes: EventChanges,
    ) -> AppResult<Event> {
        ctx.require(Permission::ManageEvents)?;
        let current = self.owned_event(ctx, event_id).await?;

        let updated = Event {
            title: required("title", &changes.title)?,
            date: changes.date,
            time: required("time", &changes.time)?,
            location: required("location", &changes.location)?,
            description: optional(changes.description.as_deref()),
            image_url: optional(changes.image_url.as_deref()),
            status: changes.status.unwrap_or(current.status),
            ..current
        };

        if !self.store.update_event(&updated).await? {
            return Err(event_not_found(event_id));
        }
        info!(%event_id, "Event updated");
        Ok(updated)
    }

    /// Active event by slug with per-shift availability for the signup page
    #[instrument(skip(self))]
    pub async fn get_public_event(&self, slug: &str) -> AppResult<PublicEvent> {
        let event = self
            .store
            .get_event_by_slug(slug.trim())
            .await?
            .filter(|e| e.status == EventStatus::Active)
            .ok_or_else(|| AppError::NotFound(format!("event '{}'", slug)))?;
        let shifts = self.store.list_shifts(event.id).await?;

        Ok(PublicEvent {
            event,
            shifts: shifts.into_iter().map(Into::into).collect(),
        })
    }

    /// What deleting the event would remove
    pub async fn event_impact(
        &self,
        ctx: &AdminContext,
        event_id: EventId,
    ) -> AppResult<DeletionImpact> {
        self.owned_event(ctx, event_id).await?;
        let shifts = self.store.list_shifts(event_id).await?;
        self.impact_of(&shifts).await
    }

    /// What deleting the shift would remove
    pub async fn shift_impact(
        &self,
        ctx: &AdminContext,
        shift_id: ShiftId,
    ) -> AppResult<DeletionImpact> {
        self.owned_shift(ctx, shift_id).await?;
        Ok(DeletionImpact {
            shifts: 1,
            registrations: self.store.count_registrations(shift_id).await?,
        })
    }

    #[instrument(skip(self, ctx, input), fields(organization_id = %ctx.organization_id()))]
    pub async fn create_shift(
        &self,
        ctx: &AdminContext,
        event_id: EventId,
        input: NewShift,
    ) -> AppResult<Shift> {
        ctx.require(Permission::ManageShifts)?;
        self.owned_event(ctx, event_id).await?;
        let fields = input.validate()?;

        let shift = Shift {
            id: ShiftId::new(),
            event_id,
            ordinal: fields.ordinal,
            name: fields.name,
            description: fields.description,
            start_time: fields.start_time,
            end_time: fields.end_time,
            capacity: fields.capacity,
            filled: 0,
            created_at: Utc::now(),
        };

        self.store.insert_shift(&shift).await.map_err(|err| {
            conflict_on_unique(err, format!("shift {} already exists for this event", shift.ordinal))
        })?;

        info!(shift_id = %shift.id, %event_id, capacity = shift.capacity, "Shift created");
        Ok(shift)
    }

    /// Update details and capacity together; a capacity below the current
    /// filled count rejects the whole edit
    #[instrument(skip(self, ctx, changes), fields(organization_id = %ctx.organization_id()))]
    pub async fn update_shift(
        &self,
        ctx: &AdminContext,
        shift_id: ShiftId,
        changes: ShiftChanges,
    ) -> AppResult<Shift> {
        ctx.require(Permission::ManageShifts)?;
        let (current, _) = self.owned_shift(ctx, shift_id).await?;
        let fields = changes.validate()?;
        let current_capacity = current.capacity;

        let updated = Shift {
            ordinal: fields.ordinal,
            name: fields.name,
            description: fields.description,
            start_time: fields.start_time,
            end_time: fields.end_time,
            ..current
        };

        let mut tx = self.store.begin().await?;
        let outcome = self
            .apply_shift_changes(tx.as_mut(), &updated, current_capacity, fields.capacity)
            .await;
        finish(tx, outcome).await?;

        info!(%shift_id, "Shift updated");
        self.store
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| shift_not_found(shift_id))
    }

    /// Capacity-only edit
    pub async fn resize_shift(
        &self,
        ctx: &AdminContext,
        shift_id: ShiftId,
        capacity: i32,
    ) -> AppResult<Shift> {
        ctx.require(Permission::ManageShifts)?;
        self.owned_shift(ctx, shift_id).await?;
        self.ledger.resize(shift_id, capacity).await
    }

    /// Delete a shift with its registrations. When registrations exist the
    /// caller must confirm first; the count is taken under the same lock as
    /// the delete.
    #[instrument(skip(self, ctx), fields(organization_id = %ctx.organization_id()))]
    pub async fn delete_shift(
        &self,
        ctx: &AdminContext,
        shift_id: ShiftId,
        confirmed: bool,
    ) -> AppResult<DeletionImpact> {
        ctx.require(Permission::ManageShifts)?;
        self.owned_shift(ctx, shift_id).await?;

        let mut tx = self.store.begin().await?;
        let outcome = remove_shift(tx.as_mut(), shift_id, confirmed).await;
        let impact = finish(tx, outcome).await?;

        info!(%shift_id, registrations = impact.registrations, "Shift deleted");
        Ok(impact)
    }

    /// Delete an event: registrations, then shifts, then the event itself,
    /// in one transaction
    #[instrument(skip(self, ctx), fields(organization_id = %ctx.organization_id()))]
    pub async fn delete_event(
        &self,
        ctx: &AdminContext,
        event_id: EventId,
        confirmed: bool,
    ) -> AppResult<DeletionImpact> {
        ctx.require(Permission::ManageEvents)?;
        self.owned_event(ctx, event_id).await?;

        let mut tx = self.store.begin().await?;
        let outcome = remove_event(tx.as_mut(), event_id, confirmed).await;
        let impact = finish(tx, outcome).await?;

        info!(
            %event_id,
            shifts = impact.shifts,
            registrations = impact.registrations,
            "Event deleted"
        );
        Ok(impact)
    }

    async fn apply_shift_changes(
        &self,
        tx: &mut dyn StoreTransaction,
        updated: &Shift,
        current_capacity: i32,
        capacity: i32,
    ) -> AppResult<()> {
        let found = tx.update_shift_details(updated).await.map_err(|err| {
            conflict_on_unique(
                err,
                format!("shift {} already exists for this event", updated.ordinal),
            )
        })?;
        if !found {
            return Err(shift_not_found(updated.id));
        }
        if capacity != current_capacity {
            self.ledger.resize_in(tx, updated.id, capacity).await?;
        }
        Ok(())
    }

    async fn impact_of(&self, shifts: &[Shift]) -> AppResult<DeletionImpact> {
        let counts =
            try_join_all(shifts.iter().map(|s| self.store.count_registrations(s.id))).await?;
        Ok(DeletionImpact {
            shifts: shifts.len() as u64,
            registrations: counts.into_iter().sum(),
        })
    }

    async fn owned_event(&self, ctx: &AdminContext, event_id: EventId) -> AppResult<Event> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        ctx.ensure_owns(event.organization_id)?;
        Ok(event)
    }

    async fn owned_shift(&self, ctx: &AdminContext, shift_id: ShiftId) -> AppResult<(Shift, Event)> {
        let shift = self
            .store
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| shift_not_found(shift_id))?;
        let event = self.owned_event(ctx, shift.event_id).await?;
        Ok((shift, event))
    }
}

async fn remove_shift(
    tx: &mut dyn StoreTransaction,
    shift_id: ShiftId,
    confirmed: bool,
) -> AppResult<DeletionImpact> {
    if !tx.lock_shift(shift_id).await? {
        return Err(shift_not_found(shift_id));
    }
    require_confirmation(tx.count_registrations(shift_id).await?, confirmed)?;

    let registrations = tx.delete_registrations_for_shift(shift_id).await?;
    if !tx.delete_shift(shift_id).await? {
        return Err(shift_not_found(shift_id));
    }
    Ok(DeletionImpact {
        shifts: 1,
        registrations,
    })
}

async fn remove_event(
    tx: &mut dyn StoreTransaction,
    event_id: EventId,
    confirmed: bool,
) -> AppResult<DeletionImpact> {
    if !tx.lock_event(event_id).await? {
        return Err(event_not_found(event_id));
    }
    require_confirmation(tx.count_event_registrations(event_id).await?, confirmed)?;

    let registrations = tx.delete_registrations_for_event(event_id).await?;
    let shifts = tx.delete_shifts_for_event(event_id).await?;
    if !tx.delete_event(event_id).await? {
        return Err(event_not_found(event_id));
    }
    Ok(DeletionImpact {
        shifts,
        registrations,
    })
}

fn require_confirmation(registrations: u64, confirmed: bool) -> AppResult<()> {
    if registrations > 0 && !confirmed {
        return Err(AppError::ConfirmationRequired { registrations });
    }
    Ok(())
}

fn conflict_on_unique(err: StoreError, message: String) -> AppError {
    match err {
        StoreError::UniqueViolation(_) => AppError::Conflict(message),
        other => other.into(),
    }
}

fn event_not_found(event_id: EventId) -> AppError {
    AppError::NotFound(format!("event {}", event_id))
}

fn shift_not_found(shift_id: ShiftId) -> AppError {
    AppError::NotFound(format!("shift {}", shift_id))
}
