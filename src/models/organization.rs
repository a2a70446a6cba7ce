use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::OrganizationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationStatus {
    Active,
    Inactive,
}

impl OrganizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrganizationStatus::Active => "active",
            OrganizationStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for OrganizationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(OrganizationStatus::Active),
            "inactive" => Ok(OrganizationStatus::Inactive),
            other => Err(format!("unknown organization status: {}", other)),
        }
    }
}

impl fmt::Display for OrganizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A nonprofit tenant. Owns events; admins and volunteers relate to it
/// through memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub logo_url: Option<String>,
    pub status: OrganizationStatus,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Minimal active organization; profile fields start empty
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OrganizationId::new(),
            name: name.into(),
            description: None,
            website: None,
            contact_email: None,
            contact_phone: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            logo_url: None,
            status: OrganizationStatus::Active,
            created_at: Utc::now(),
        }
    }
}
