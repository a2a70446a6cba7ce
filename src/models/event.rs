use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{EventId, OrganizationId};
use crate::models::shift::{Shift, ShiftAvailability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EventStatus::Active),
            "cancelled" => Ok(EventStatus::Cancelled),
            "completed" => Ok(EventStatus::Completed),
            other => Err(format!("unknown event status: {}", other)),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub organization_id: OrganizationId,
    /// Human-facing identifier used in signup links; immutable once created
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    /// Display label for the time window, e.g. "9:00 AM - 3:00 PM"
    pub time: String,
    pub location: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

/// Event with its shifts and the derived capacity totals shown in the admin list
#[derive(Debug, Clone, Serialize)]
pub struct EventWithShifts {
    #[serde(flatten)]
    pub event: Event,
    pub shifts: Vec<Shift>,
    pub total_capacity: i64,
    pub total_filled: i64,
}

impl EventWithShifts {
    pub fn new(event: Event, shifts: Vec<Shift>) -> Self {
        let total_capacity = shifts.iter().map(|s| i64::from(s.capacity)).sum();
        let total_filled = shifts.iter().map(|s| i64::from(s.filled)).sum();
        Self {
            event,
            shifts,
            total_capacity,
            total_filled,
        }
    }
}

/// What a cascading delete would remove; drives the confirm-before-delete prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionImpact {
    pub shifts: u64,
    pub registrations: u64,
}

/// Active event with per-shift availability, as served to the signup page
#[derive(Debug, Clone, Serialize)]
pub struct PublicEvent {
    #[serde(flatten)]
    pub event: Event,
    pub shifts: Vec<ShiftAvailability>,
}
