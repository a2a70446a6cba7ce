// Domain models - organizations, events, shifts, registrations and memberships

pub mod event;
pub mod membership;
pub mod organization;
pub mod registration;
pub mod shift;

pub use event::{DeletionImpact, Event, EventStatus, EventWithShifts, PublicEvent};
pub use membership::{
    AdminMembership, AdminRole, Permission, PermissionSet, VolunteerMembership, VolunteerStatus,
};
pub use organization::{Organization, OrganizationStatus};
pub use registration::{Registration, VolunteerRecord};
pub use shift::{Shift, ShiftAvailability};
