// Volunteer directory - every registration across the organization's events

use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

use crate::core::EventId;
use crate::error::AppResult;
use crate::infrastructure::database::VolunteerStore;
use crate::models::VolunteerRecord;
use crate::services::organization_resolver::AdminContext;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolunteerFilter {
    /// Case-insensitive substring of the volunteer's name or email
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub event_id: Option<EventId>,
}

impl VolunteerFilter {
    fn matches(&self, record: &VolunteerRecord, needle: Option<&str>) -> bool {
        if let Some(event_id) = self.event_id {
            if record.event_id != event_id {
                return false;
            }
        }
        match needle {
            Some(needle) => {
                record.registration.name.to_lowercase().contains(needle)
                    || record.registration.email.as_str().contains(needle)
            }
            None => true,
        }
    }
}

pub struct VolunteerDirectory {
    store: Arc<dyn VolunteerStore>,
}

impl VolunteerDirectory {
    pub fn new(store: Arc<dyn VolunteerStore>) -> Self {
        Self { store }
    }

    /// Newest registrations first
    #[instrument(skip(self, ctx), fields(organization_id = %ctx.organization_id()))]
    pub async fn list(
        &self,
        ctx: &AdminContext,
        filter: &VolunteerFilter,
    ) -> AppResult<Vec<VolunteerRecord>> {
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let records = self.store.list_volunteers(ctx.organization_id()).await?;
        Ok(records
            .into_iter()
            .filter(|record| filter.matches(record, needle.as_deref()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EmailAddress, RegistrationId, ShiftId};
    use crate::models::Registration;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn record(name: &str, email: &str, event_id: EventId) -> VolunteerRecord {
        VolunteerRecord {
            registration: Registration {
                id: RegistrationId::new(),
                shift_id: ShiftId::new(),
                name: name.into(),
                email: EmailAddress::normalized(email),
                phone: None,
                registered_at: Utc::now(),
            },
            shift_name: "Morning Team".into(),
            shift_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            shift_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            event_id,
            event_slug: "beach-cleanup".into(),
            event_title: "Beach Cleanup".into(),
            event_date: NaiveDate::from_ymd_opt(2025, 4, 12).unwrap(),
        }
    }

    #[test]
    fn test_search_is_case_insensitive_over_name_and_email() {
        let event = EventId::new();
        let filter = VolunteerFilter::default();
        let ada = record("Ada Lovelace", "ada@example.org", event);

        assert!(filter.matches(&ada, Some("lovelace")));
        assert!(filter.matches(&ada, Some("example.org")));
        assert!(!filter.matches(&ada, Some("hopper")));
        assert!(filter.matches(&ada, None));
    }

    #[test]
    fn test_event_filter() {
        let event = EventId::new();
        let filter = VolunteerFilter {
            search: None,
            event_id: Some(event),
        };

        assert!(filter.matches(&record("Ada", "ada@example.org", event), None));
        assert!(!filter.matches(&record("Ada", "ada@example.org", EventId::new()), None));
    }
}
