// Volunteer Hub - organization context, shift capacity and registration workflows

// Core types and input validation
pub mod core;

// Domain models
pub mod models;

// Storage backends and the request viewer context
pub mod infrastructure;

// Organization resolution, capacity ledger, registrations and admin workflows
pub mod services;

// HTTP surface
pub mod api;

pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
