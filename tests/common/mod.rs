#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;

use volunteer_hub::app_state::AppState;
use volunteer_hub::config::Config;
use volunteer_hub::core::{OrganizationId, UserId};
use volunteer_hub::infrastructure::{MembershipRepository, SqliteDatabase, Storage};
use volunteer_hub::models::{
    AdminMembership, AdminRole, Organization, Permission, PermissionSet, VolunteerMembership,
    VolunteerStatus,
};
use volunteer_hub::services::{
    AdminContext, LoggingNotifier, NewEvent, NewShift, RegistrationNotifier, RegistrationRequest,
};

pub struct Harness {
    pub db: Arc<SqliteDatabase>,
    pub state: AppState,
}

pub async fn harness() -> Harness {
    harness_with_notifier(Arc::new(LoggingNotifier)).await
}

pub async fn harness_with_notifier(notifier: Arc<dyn RegistrationNotifier>) -> Harness {
    let db = Arc::new(SqliteDatabase::new_in_memory().await.unwrap());
    let state = AppState::from_storage(Config::default(), Storage::from_backend(db.clone()), notifier);
    Harness { db, state }
}

pub async fn seed_organization(db: &SqliteDatabase, name: &str) -> Organization {
    let organization = Organization::new(name);
    db.create_organization(&organization).await.unwrap();
    organization
}

pub fn all_permissions() -> PermissionSet {
    [
        Permission::ManageEvents,
        Permission::ManageShifts,
        Permission::ManageVolunteers,
        Permission::ManageOrganization,
    ]
    .into_iter()
    .collect()
}

/// Admin membership created `minutes_ago` minutes in the past
pub async fn grant_admin(
    db: &SqliteDatabase,
    user_id: UserId,
    organization_id: OrganizationId,
    role: AdminRole,
    permissions: PermissionSet,
    minutes_ago: i64,
) {
    db.add_admin_membership(&AdminMembership {
        user_id,
        organization_id,
        role,
        permissions,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    })
    .await
    .unwrap();
}

pub async fn grant_volunteer(
    db: &SqliteDatabase,
    user_id: UserId,
    organization_id: OrganizationId,
    status: VolunteerStatus,
) {
    db.add_volunteer_membership(&VolunteerMembership {
        user_id,
        organization_id,
        status,
        created_at: Utc::now(),
    })
    .await
    .unwrap();
}

/// A fresh organization with an owner, resolved into an admin context
pub async fn owner_context(harness: &Harness, name: &str) -> AdminContext {
    let organization = seed_organization(&harness.db, name).await;
    let user = UserId::new();
    grant_admin(&harness.db, user, organization.id, AdminRole::Owner, PermissionSet::new(), 0).await;
    harness.state.resolver.require_admin(user).await.unwrap()
}

pub fn new_event(slug: &str) -> NewEvent {
    NewEvent {
        slug: slug.to_string(),
        title: "Beach Cleanup".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 4, 12).unwrap(),
        time: "9:00 AM - 3:00 PM".to_string(),
        location: "North Beach".to_string(),
        description: Some("Bring gloves".to_string()),
        image_url: None,
    }
}

pub fn new_shift(ordinal: i32, capacity: i32) -> NewShift {
    NewShift {
        ordinal,
        name: format!("Shift {}", ordinal),
        description: None,
        start_time: NaiveTime::from_hms_opt(8 + ordinal as u32, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(9 + ordinal as u32, 0, 0).unwrap(),
        capacity,
    }
}

pub fn signup(name: &str, email: &str) -> RegistrationRequest {
    RegistrationRequest {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
    }
}
