use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{EventId, ShiftId};

/// A bounded-capacity time slot within an event.
///
/// `filled` is only ever changed through the capacity ledger; the storage
/// layer enforces `0 <= filled <= capacity` with a check constraint as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub event_id: EventId,
    /// Shift number, unique within the event
    pub ordinal: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub filled: i32,
    pub created_at: DateTime<Utc>,
}

impl Shift {
    pub fn spots_left(&self) -> i32 {
        (self.capacity - self.filled).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.capacity
    }
}

/// Shift as shown on the public signup page
#[derive(Debug, Clone, Serialize)]
pub struct ShiftAvailability {
    #[serde(flatten)]
    pub shift: Shift,
    pub spots_left: i32,
}

impl From<Shift> for ShiftAvailability {
    fn from(shift: Shift) -> Self {
        let spots_left = shift.spots_left();
        Self { shift, spots_left }
    }
}
