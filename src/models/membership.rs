use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::core::{OrganizationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Owner,
    Admin,
    Coordinator,
}

impl AdminRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::Owner => "owner",
            AdminRole::Admin => "admin",
            AdminRole::Coordinator => "coordinator",
        }
    }
}

impl FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(AdminRole::Owner),
            "admin" => Ok(AdminRole::Admin),
            "coordinator" => Ok(AdminRole::Coordinator),
            other => Err(format!("unknown admin role: {}", other)),
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageEvents,
    ManageShifts,
    ManageVolunteers,
    ManageOrganization,
}

pub type PermissionSet = BTreeSet<Permission>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminMembership {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: AdminRole,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerStatus {
    Active,
    Pending,
    Inactive,
}

impl VolunteerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VolunteerStatus::Active => "active",
            VolunteerStatus::Pending => "pending",
            VolunteerStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for VolunteerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VolunteerStatus::Active),
            "pending" => Ok(VolunteerStatus::Pending),
            "inactive" => Ok(VolunteerStatus::Inactive),
            other => Err(format!("unknown volunteer status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolunteerMembership {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub status: VolunteerStatus,
    pub created_at: DateTime<Utc>,
}

/// Permissions are persisted as a JSON array of snake_case names
pub fn encode_permissions(permissions: &PermissionSet) -> String {
    serde_json::to_string(permissions).unwrap_or_else(|_| "[]".to_string())
}

pub fn decode_permissions(raw: &str) -> Result<PermissionSet, serde_json::Error> {
    serde_json::from_str(raw)
}
