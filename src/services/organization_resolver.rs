// Organization Resolver - maps a signed-in user to exactly one organization context
//
// Admin memberships take precedence over volunteer memberships. A user who
// administers several organizations gets the one they last switched to, or
// their earliest membership when no selection is on record.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::{OrganizationId, UserId};
use crate::error::{AppError, AppResult, StoreResult};
use crate::infrastructure::database::MembershipRepository;
use crate::models::{
    AdminMembership, AdminRole, Organization, Permission, PermissionSet, VolunteerStatus,
};

/// Resolved admin view of one organization. Passed explicitly into every
/// admin operation; there is no ambient "current organization".
#[derive(Debug, Clone, Serialize)]
pub struct AdminContext {
    pub user_id: UserId,
    pub organization: Organization,
    pub role: AdminRole,
    pub permissions: PermissionSet,
    /// Every existing organization this user administers, in membership order
    pub available_organizations: Vec<OrganizationId>,
}

impl AdminContext {
    pub fn organization_id(&self) -> OrganizationId {
        self.organization.id
    }

    /// Owners hold every permission; other roles hold exactly their set
    pub fn can(&self, permission: Permission) -> bool {
        self.role == AdminRole::Owner || self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "the {} role lacks {:?}",
                self.role, permission
            )))
        }
    }

    /// Guard against touching another organization's data
    pub fn ensure_owns(&self, organization_id: OrganizationId) -> AppResult<()> {
        if self.organization.id == organization_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "this record belongs to a different organization".to_string(),
            ))
        }
    }

    pub fn can_switch(&self) -> bool {
        self.available_organizations.len() > 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VolunteerContext {
    pub user_id: UserId,
    pub organization: Organization,
    pub status: VolunteerStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrganizationContext {
    Admin(AdminContext),
    Volunteer(VolunteerContext),
    None,
}

impl OrganizationContext {
    pub fn organization_id(&self) -> Option<OrganizationId> {
        match self {
            OrganizationContext::Admin(ctx) => Some(ctx.organization.id),
            OrganizationContext::Volunteer(ctx) => Some(ctx.organization.id),
            OrganizationContext::None => None,
        }
    }
}

pub struct OrganizationResolver {
    memberships: Arc<dyn MembershipRepository>,
}

impl OrganizationResolver {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    /// Resolve the user's organization context.
    ///
    /// Storage being unreachable yields `ContextUnavailable`. Any other
    /// failure on the admin lookup falls back to volunteer membership, and
    /// if that finds nothing the result is still `ContextUnavailable` rather
    /// than an empty context.
    #[instrument(skip(self))]
    pub async fn resolve(&self, user_id: UserId) -> AppResult<OrganizationContext> {
        let mut admin_lookup_failed = false;

        match self.resolve_admin(user_id).await {
            Ok(Some(ctx)) => {
                debug!(organization_id = %ctx.organization.id, role = %ctx.role, "Resolved admin context");
                return Ok(OrganizationContext::Admin(ctx));
            }
            Ok(None) => {}
            Err(err) if err.is_unavailable() => {
                warn!(error = %err, "Admin membership lookup failed: storage unavailable");
                return Err(AppError::ContextUnavailable(err.to_string()));
            }
            Err(err) => {
                warn!(error = %err, "Admin membership lookup failed, falling back to volunteer membership");
                admin_lookup_failed = true;
            }
        }

        match self.resolve_volunteer(user_id).await {
            Ok(Some(ctx)) => {
                debug!(organization_id = %ctx.organization.id, "Resolved volunteer context");
                Ok(OrganizationContext::Volunteer(ctx))
            }
            Ok(None) if admin_lookup_failed => Err(AppError::ContextUnavailable(
                "admin membership lookup failed".to_string(),
            )),
            Ok(None) => Ok(OrganizationContext::None),
            Err(err) => {
                warn!(error = %err, "Volunteer membership lookup failed");
                Err(AppError::ContextUnavailable(err.to_string()))
            }
        }
    }

    /// Make `organization_id` the user's current organization. Only allowed
    /// where the user holds an admin membership.
    #[instrument(skip(self))]
    pub async fn switch_organization(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AppResult<OrganizationContext> {
        let memberships = self
            .memberships
            .admin_memberships(user_id)
            .await
            .map_err(|e| AppError::ContextUnavailable(e.to_string()))?;

        if !memberships
            .iter()
            .any(|m| m.organization_id == organization_id)
        {
            return Err(AppError::Forbidden(
                "you are not an admin of that organization".to_string(),
            ));
        }
        if self
            .memberships
            .get_organization(organization_id)
            .await?
            .is_none()
        {
            warn!(%organization_id, "Refusing switch to a missing organization");
            return Err(AppError::NotFound(format!(
                "organization {}",
                organization_id
            )));
        }

        self.memberships
            .record_selection(user_id, organization_id, Utc::now())
            .await?;
        debug!(%organization_id, "Recorded organization selection");

        self.resolve(user_id).await
    }

    /// Resolve and insist on an admin context
    pub async fn require_admin(&self, user_id: UserId) -> AppResult<AdminContext> {
        match self.resolve(user_id).await? {
            OrganizationContext::Admin(ctx) => Ok(ctx),
            _ => Err(AppError::Forbidden(
                "an organization admin membership is required".to_string(),
            )),
        }
    }

    async fn resolve_admin(&self, user_id: UserId) -> StoreResult<Option<AdminContext>> {
        let memberships = self.memberships.admin_memberships(user_id).await?;
        if memberships.is_empty() {
            return Ok(None);
        }

        let selected = self.memberships.latest_selection(user_id).await?;

        let mut resolved = Vec::with_capacity(memberships.len());
        for membership in memberships {
            match self
                .memberships
                .get_organization(membership.organization_id)
                .await?
            {
                Some(organization) => resolved.push((membership, organization)),
                None => warn!(
                    organization_id = %membership.organization_id,
                    "Skipping admin membership for a missing organization"
                ),
            }
        }

        let available: Vec<OrganizationId> = resolved.iter().map(|(_, org)| org.id).collect();
        let Some((membership, organization)) = pick_current(resolved, selected) else {
            return Ok(None);
        };

        Ok(Some(AdminContext {
            user_id,
            organization,
            role: membership.role,
            permissions: membership.permissions,
            available_organizations: available,
        }))
    }

    async fn resolve_volunteer(&self, user_id: UserId) -> StoreResult<Option<VolunteerContext>> {
        let Some(membership) = self.memberships.active_volunteer_membership(user_id).await? else {
            return Ok(None);
        };

        match self
            .memberships
            .get_organization(membership.organization_id)
            .await?
        {
            Some(organization) => Ok(Some(VolunteerContext {
                user_id,
                organization,
                status: membership.status,
            })),
            None => {
                warn!(
                    organization_id = %membership.organization_id,
                    "Skipping volunteer membership for a missing organization"
                );
                Ok(None)
            }
        }
    }
}

/// The selected organization when it is still a resolvable admin
/// membership, otherwise the first in storage order (created_at, organization id)
fn pick_current(
    mut resolved: Vec<(AdminMembership, Organization)>,
    selected: Option<OrganizationId>,
) -> Option<(AdminMembership, Organization)> {
    let pos = selected
        .and_then(|selected| resolved.iter().position(|(_, org)| org.id == selected))
        .unwrap_or(0);
    if pos < resolved.len() {
        Some(resolved.swap_remove(pos))
    } else {
        None
    }
}
