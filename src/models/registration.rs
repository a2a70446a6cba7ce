use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{EmailAddress, EventId, RegistrationId, ShiftId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub shift_id: ShiftId,
    pub name: String,
    pub email: EmailAddress,
    pub phone: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Registration joined with its shift and event, as listed in the admin
/// volunteers screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolunteerRecord {
    pub registration: Registration,
    pub shift_name: String,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub event_id: EventId,
    pub event_slug: String,
    pub event_title: String,
    pub event_date: NaiveDate,
}
