// Core types and input validation

pub mod strong_types;
pub mod validation;

pub use strong_types::{EmailAddress, EventId, OrganizationId, RegistrationId, ShiftId, UserId};
