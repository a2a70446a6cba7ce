// Capacity Ledger - the only writer of a shift's `filled` counter
//
// Every change is a single conditional UPDATE, so the bound check and the
// write happen in one statement and `0 <= filled <= capacity` holds even
// when two requests race for the last spot.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::validation::parse_capacity;
use crate::core::ShiftId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{StoreTransaction, VolunteerStore};
use crate::models::Shift;

#[derive(Clone)]
pub struct CapacityLedger {
    store: Arc<dyn VolunteerStore>,
}

impl CapacityLedger {
    pub fn new(store: Arc<dyn VolunteerStore>) -> Self {
        Self { store }
    }

    /// Take one spot, or `ShiftFull` when none are left
    #[instrument(skip(self))]
    pub async fn reserve(&self, shift_id: ShiftId) -> AppResult<()> {
        if self.store.try_reserve_spot(shift_id).await? {
            debug!("Reserved spot");
            return Ok(());
        }
        match self.store.get_shift(shift_id).await? {
            Some(_) => Err(AppError::ShiftFull),
            None => Err(shift_not_found(shift_id)),
        }
    }

    /// `reserve` inside a caller-owned transaction
    pub async fn reserve_in(
        &self,
        tx: &mut dyn StoreTransaction,
        shift_id: ShiftId,
    ) -> AppResult<()> {
        if tx.try_reserve_spot(shift_id).await? {
            debug!(%shift_id, "Reserved spot");
            return Ok(());
        }
        match tx.get_shift(shift_id).await? {
            Some(_) => Err(AppError::ShiftFull),
            None => Err(shift_not_found(shift_id)),
        }
    }

    /// Give one spot back. Releasing at zero leaves `filled` at zero.
    #[instrument(skip(self))]
    pub async fn release(&self, shift_id: ShiftId) -> AppResult<()> {
        if !self.store.release_spot(shift_id).await? {
            warn!("Release on a shift with no filled spots; filled stays at 0");
        }
        Ok(())
    }

    pub async fn release_in(
        &self,
        tx: &mut dyn StoreTransaction,
        shift_id: ShiftId,
    ) -> AppResult<()> {
        if !tx.release_spot(shift_id).await? {
            warn!(%shift_id, "Release on a shift with no filled spots; filled stays at 0");
        }
        Ok(())
    }

    /// Change capacity; never below the current filled count
    #[instrument(skip(self))]
    pub async fn resize(&self, shift_id: ShiftId, capacity: i32) -> AppResult<Shift> {
        let capacity = parse_capacity(capacity)?;

        if self.store.try_resize_capacity(shift_id, capacity).await? {
            debug!("Capacity changed");
            return self
                .store
                .get_shift(shift_id)
                .await?
                .ok_or_else(|| shift_not_found(shift_id));
        }
        match self.store.get_shift(shift_id).await? {
            Some(shift) => Err(AppError::BelowFilled {
                filled: shift.filled,
                requested: capacity,
            }),
            None => Err(shift_not_found(shift_id)),
        }
    }

    pub async fn resize_in(
        &self,
        tx: &mut dyn StoreTransaction,
        shift_id: ShiftId,
        capacity: i32,
    ) -> AppResult<()> {
        let capacity = parse_capacity(capacity)?;

        if tx.try_resize_capacity(shift_id, capacity).await? {
            debug!(%shift_id, capacity, "Capacity changed");
            return Ok(());
        }
        match tx.get_shift(shift_id).await? {
            Some(shift) => Err(AppError::BelowFilled {
                filled: shift.filled,
                requested: capacity,
            }),
            None => Err(shift_not_found(shift_id)),
        }
    }
}

fn shift_not_found(shift_id: ShiftId) -> AppError {
    AppError::NotFound(format!("shift {}", shift_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite_database::SqliteDatabase;
    use crate::models::{Event, EventStatus, Organization};
    use crate::core::EventId;
    use crate::infrastructure::database::MembershipRepository;
    use chrono::{NaiveDate, NaiveTime, Utc};

    async fn ledger_with_shift(capacity: i32) -> (CapacityLedger, Arc<SqliteDatabase>, ShiftId) {
        let db = Arc::new(SqliteDatabase::new_in_memory().await.unwrap());
        let org = Organization::new("Harbor Food Bank");
        db.create_organization(&org).await.unwrap();
        let event = Event {
            id: EventId::new(),
            organization_id: org.id,
            slug: "pantry-restock".into(),
            title: "Pantry Restock".into(),
            date: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            time: "8:00 AM - 12:00 PM".into(),
            location: "Warehouse 2".into(),
            description: None,
            image_url: None,
            status: EventStatus::Active,
            created_at: Utc::now(),
        };
        db.insert_event(&event).await.unwrap();
        let shift = Shift {
            id: ShiftId::new(),
            event_id: event.id,
            ordinal: 1,
            name: "Sorting".into(),
            description: None,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity,
            filled: 0,
            created_at: Utc::now(),
        };
        db.insert_shift(&shift).await.unwrap();

        (CapacityLedger::new(db.clone()), db, shift.id)
    }

    #[tokio::test]
    async fn test_full_shift_rejects_reserve() {
        let (ledger, db, shift_id) = ledger_with_shift(2).await;

        ledger.reserve(shift_id).await.unwrap();
        ledger.reserve(shift_id).await.unwrap();
        assert!(matches!(
            ledger.reserve(shift_id).await,
            Err(AppError::ShiftFull)
        ));

        assert_eq!(db.get_shift(shift_id).await.unwrap().unwrap().filled, 2);
    }

    #[tokio::test]
    async fn test_reserve_on_missing_shift_is_not_found() {
        let (ledger, _db, _) = ledger_with_shift(2).await;
        assert!(matches!(
            ledger.reserve(ShiftId::new()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filled_stays_within_bounds() {
        let (ledger, db, shift_id) = ledger_with_shift(3).await;

        ledger.release(shift_id).await.unwrap();
        for _ in 0..5 {
            let _ = ledger.reserve(shift_id).await;
        }
        ledger.release(shift_id).await.unwrap();
        let _ = ledger.reserve(shift_id).await;

        let shift = db.get_shift(shift_id).await.unwrap().unwrap();
        assert!(shift.filled >= 0 && shift.filled <= shift.capacity);
        assert_eq!(shift.filled, 3);
    }

    #[tokio::test]
    async fn test_resize_below_filled_is_rejected() {
        let (ledger, db, shift_id) = ledger_with_shift(5).await;
        for _ in 0..3 {
            ledger.reserve(shift_id).await.unwrap();
        }

        let result = ledger.resize(shift_id, 2).await;
        assert!(matches!(
            result,
            Err(AppError::BelowFilled {
                filled: 3,
                requested: 2
            })
        ));
        assert_eq!(db.get_shift(shift_id).await.unwrap().unwrap().capacity, 5);

        let resized = ledger.resize(shift_id, 3).await.unwrap();
        assert_eq!(resized.capacity, 3);
        assert!(resized.is_full());
    }

    #[tokio::test]
    async fn test_resize_requires_positive_capacity() {
        let (ledger, _db, shift_id) = ledger_with_shift(5).await;
        assert!(matches!(
            ledger.resize(shift_id, 0).await,
            Err(AppError::ValidationFailed { field: "capacity", .. })
        ));
    }
}
