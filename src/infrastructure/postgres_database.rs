use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{Executor, Row, Transaction};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use crate::core::{EmailAddress, EventId, OrganizationId, RegistrationId, ShiftId, UserId};
use crate::error::{StoreError, StoreResult};
use crate::infrastructure::database::{MembershipRepository, StoreTransaction, VolunteerStore};
use crate::models::membership::{decode_permissions, encode_permissions};
use crate::models::{
    AdminMembership, Event, Organization, Registration, Shift, VolunteerMembership,
    VolunteerRecord, VolunteerStatus,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        website TEXT,
        contact_email TEXT,
        contact_phone TEXT,
        address TEXT,
        city TEXT,
        state TEXT,
        zip_code TEXT,
        logo_url TEXT,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_admins (
        user_id UUID NOT NULL,
        organization_id UUID NOT NULL REFERENCES organizations(id),
        role TEXT NOT NULL,
        permissions TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (user_id, organization_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_volunteers (
        user_id UUID NOT NULL,
        organization_id UUID NOT NULL REFERENCES organizations(id),
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (user_id, organization_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_selections (
        user_id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        selected_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL REFERENCES organizations(id),
        slug TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        date DATE NOT NULL,
        time TEXT NOT NULL,
        location TEXT NOT NULL,
        description TEXT,
        image_url TEXT,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shifts (
        id UUID PRIMARY KEY,
        event_id UUID NOT NULL REFERENCES events(id),
        ordinal INTEGER NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        start_time TIME NOT NULL,
        end_time TIME NOT NULL,
        capacity INTEGER NOT NULL CHECK (capacity >= 1),
        filled INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (event_id, ordinal),
        CHECK (filled >= 0 AND filled <= capacity)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS volunteer_registrations (
        id UUID PRIMARY KEY,
        shift_id UUID NOT NULL REFERENCES shifts(id),
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        registered_at TIMESTAMPTZ NOT NULL,
        UNIQUE (shift_id, email)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_organization ON events(organization_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_shifts_event ON shifts(event_id, ordinal)",
    "CREATE INDEX IF NOT EXISTS idx_registrations_shift ON volunteer_registrations(shift_id)",
];

const EVENT_COLUMNS: &str = "id, organization_id, slug, title, date, time, location, description, image_url, status, created_at";
const SHIFT_COLUMNS: &str = "id, event_id, ordinal, name, description, start_time, end_time, capacity, filled, created_at";
const REGISTRATION_COLUMNS: &str = "id, shift_id, name, email, phone, registered_at";

/// PostgreSQL implementation of the storage traits
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        let db = Self::new(pool);
        db.initialize().await?;
        Ok(db)
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they are missing
    pub async fn initialize(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("PostgreSQL schema ready");
        Ok(())
    }
}

fn parse_column<T: FromStr<Err = String>>(value: String) -> StoreResult<T> {
    value.parse().map_err(StoreError::Query)
}

fn organization_from_row(row: &PgRow) -> StoreResult<Organization> {
    Ok(Organization {
        id: OrganizationId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        website: row.try_get("website")?,
        contact_email: row.try_get("contact_email")?,
        contact_phone: row.try_get("contact_phone")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        logo_url: row.try_get("logo_url")?,
        status: parse_column(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn admin_membership_from_row(row: &PgRow) -> StoreResult<AdminMembership> {
    let permissions: String = row.try_get("permissions")?;
    Ok(AdminMembership {
        user_id: UserId(row.try_get("user_id")?),
        organization_id: OrganizationId(row.try_get("organization_id")?),
        role: parse_column(row.try_get("role")?)?,
        permissions: decode_permissions(&permissions)
            .map_err(|e| StoreError::Query(format!("invalid permissions column: {}", e)))?,
        created_at: row.try_get("created_at")?,
    })
}

fn volunteer_membership_from_row(row: &PgRow) -> StoreResult<VolunteerMembership> {
    Ok(VolunteerMembership {
        user_id: UserId(row.try_get("user_id")?),
        organization_id: OrganizationId(row.try_get("organization_id")?),
        status: parse_column(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn event_from_row(row: &PgRow) -> StoreResult<Event> {
    Ok(Event {
        id: EventId(row.try_get("id")?),
        organization_id: OrganizationId(row.try_get("organization_id")?),
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        status: parse_column(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn shift_from_row(row: &PgRow) -> StoreResult<Shift> {
    Ok(Shift {
        id: ShiftId(row.try_get("id")?),
        event_id: EventId(row.try_get("event_id")?),
        ordinal: row.try_get("ordinal")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        capacity: row.try_get("capacity")?,
        filled: row.try_get("filled")?,
        created_at: row.try_get("created_at")?,
    })
}

fn registration_from_row(row: &PgRow) -> StoreResult<Registration> {
    let email: String = row.try_get("email")?;
    Ok(Registration {
        id: RegistrationId(row.try_get("id")?),
        shift_id: ShiftId(row.try_get("shift_id")?),
        name: row.try_get("name")?,
        email: EmailAddress::normalized(&email),
        phone: row.try_get("phone")?,
        registered_at: row.try_get("registered_at")?,
    })
}

async fn fetch_shift<'e, E>(executor: E, id: ShiftId) -> StoreResult<Option<Shift>>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!("SELECT {} FROM shifts WHERE id = $1", SHIFT_COLUMNS))
        .bind(id.value())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(shift_from_row).transpose()
}

// The row lock taken by UPDATE makes a concurrent reserve re-check
// `filled < capacity` against the committed value.
async fn reserve_spot<'e, E>(executor: E, shift_id: ShiftId) -> StoreResult<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result =
        sqlx::query("UPDATE shifts SET filled = filled + 1 WHERE id = $1 AND filled < capacity")
            .bind(shift_id.value())
            .execute(executor)
            .await?;
    Ok(result.rows_affected() == 1)
}

async fn release_spot<'e, E>(executor: E, shift_id: ShiftId) -> StoreResult<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("UPDATE shifts SET filled = filled - 1 WHERE id = $1 AND filled > 0")
        .bind(shift_id.value())
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn resize_capacity<'e, E>(executor: E, shift_id: ShiftId, capacity: i32) -> StoreResult<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("UPDATE shifts SET capacity = $1 WHERE id = $2 AND filled <= $1")
        .bind(capacity)
        .bind(shift_id.value())
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl MembershipRepository for PostgresDatabase {
    async fn create_organization(&self, organization: &Organization) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, description, website, contact_email, contact_phone,
                address, city, state, zip_code, logo_url, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(organization.id.value())
        .bind(&organization.name)
        .bind(&organization.description)
        .bind(&organization.website)
        .bind(&organization.contact_email)
        .bind(&organization.contact_phone)
        .bind(&organization.address)
        .bind(&organization.city)
        .bind(&organization.state)
        .bind(&organization.zip_code)
        .bind(&organization.logo_url)
        .bind(organization.status.as_str())
        .bind(organization.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>> {
        let row = sqlx::query("SELECT * FROM organizations WHERE id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn add_admin_membership(&self, membership: &AdminMembership) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO organization_admins (user_id, organization_id, role, permissions, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(membership.user_id.value())
        .bind(membership.organization_id.value())
        .bind(membership.role.as_str())
        .bind(encode_permissions(&membership.permissions))
        .bind(membership.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn admin_memberships(&self, user_id: UserId) -> StoreResult<Vec<AdminMembership>> {
        let rows = sqlx::query(
            "SELECT * FROM organization_admins WHERE user_id = $1 ORDER BY created_at, organization_id",
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(admin_membership_from_row).collect()
    }

    async fn add_volunteer_membership(&self, membership: &VolunteerMembership) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO organization_volunteers (user_id, organization_id, status, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(membership.user_id.value())
        .bind(membership.organization_id.value())
        .bind(membership.status.as_str())
        .bind(membership.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_volunteer_membership(
        &self,
        user_id: UserId,
    ) -> StoreResult<Option<VolunteerMembership>> {
        let row = sqlx::query(
            "SELECT * FROM organization_volunteers WHERE user_id = $1 AND status = $2 ORDER BY created_at, organization_id LIMIT 1",
        )
        .bind(user_id.value())
        .bind(VolunteerStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(volunteer_membership_from_row).transpose()
    }

    async fn record_selection(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        selected_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organization_selections (user_id, organization_id, selected_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
                SET organization_id = EXCLUDED.organization_id, selected_at = EXCLUDED.selected_at
            "#,
        )
        .bind(user_id.value())
        .bind(organization_id.value())
        .bind(selected_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_selection(&self, user_id: UserId) -> StoreResult<Option<OrganizationId>> {
        let selected: Option<Uuid> = sqlx::query_scalar(
            "SELECT organization_id FROM organization_selections WHERE user_id = $1",
        )
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await?;
        Ok(selected.map(OrganizationId))
    }
}

#[async_trait]
impl VolunteerStore for PostgresDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresStoreTransaction { tx }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO events ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            EVENT_COLUMNS
        ))
        .bind(event.id.value())
        .bind(event.organization_id.value())
        .bind(&event.slug)
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.time)
        .bind(&event.location)
        .bind(&event.description)
        .bind(&event.image_url)
        .bind(event.status.as_str())
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn get_event_by_slug(&self, slug: &str) -> StoreResult<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE slug = $1", EVENT_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn update_event(&self, event: &Event) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET title = $1, date = $2, time = $3, location = $4, description = $5, image_url = $6, status = $7
            WHERE id = $8
            "#,
        )
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.time)
        .bind(&event.location)
        .bind(&event.description)
        .bind(&event.image_url)
        .bind(event.status.as_str())
        .bind(event.id.value())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_events(&self, organization_id: OrganizationId) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM events WHERE organization_id = $1 ORDER BY date, created_at",
            EVENT_COLUMNS
        ))
        .bind(organization_id.value())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn insert_shift(&self, shift: &Shift) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO shifts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            SHIFT_COLUMNS
        ))
        .bind(shift.id.value())
        .bind(shift.event_id.value())
        .bind(shift.ordinal)
        .bind(&shift.name)
        .bind(&shift.description)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.capacity)
        .bind(shift.filled)
        .bind(shift.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_shift(&self, id: ShiftId) -> StoreResult<Option<Shift>> {
        fetch_shift(&self.pool, id).await
    }

    async fn list_shifts(&self, event_id: EventId) -> StoreResult<Vec<Shift>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM shifts WHERE event_id = $1 ORDER BY ordinal",
            SHIFT_COLUMNS
        ))
        .bind(event_id.value())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(shift_from_row).collect()
    }

    async fn try_reserve_spot(&self, shift_id: ShiftId) -> StoreResult<bool> {
        reserve_spot(&self.pool, shift_id).await
    }

    async fn release_spot(&self, shift_id: ShiftId) -> StoreResult<bool> {
        release_spot(&self.pool, shift_id).await
    }

    async fn try_resize_capacity(&self, shift_id: ShiftId, capacity: i32) -> StoreResult<bool> {
        resize_capacity(&self.pool, shift_id, capacity).await
    }

    async fn get_registration(&self, id: RegistrationId) -> StoreResult<Option<Registration>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM volunteer_registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(registration_from_row).transpose()
    }

    async fn count_registrations(&self, shift_id: ShiftId) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM volunteer_registrations WHERE shift_id = $1")
                .bind(shift_id.value())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn list_volunteers(
        &self,
        organization_id: OrganizationId,
    ) -> StoreResult<Vec<VolunteerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.shift_id, r.name, r.email, r.phone, r.registered_at,
                   s.name AS shift_name, s.start_time AS shift_start, s.end_time AS shift_end,
                   e.id AS event_id, e.slug AS event_slug, e.title AS event_title, e.date AS event_date
            FROM volunteer_registrations r
            JOIN shifts s ON s.id = r.shift_id
            JOIN events e ON e.id = s.event_id
            WHERE e.organization_id = $1
            ORDER BY r.registered_at DESC
            "#,
        )
        .bind(organization_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(VolunteerRecord {
                    registration: registration_from_row(row)?,
                    shift_name: row.try_get("shift_name")?,
                    shift_start: row.try_get("shift_start")?,
                    shift_end: row.try_get("shift_end")?,
                    event_id: EventId(row.try_get("event_id")?),
                    event_slug: row.try_get("event_slug")?,
                    event_title: row.try_get("event_title")?,
                    event_date: row.try_get("event_date")?,
                })
            })
            .collect()
    }
}

pub struct PostgresStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresStoreTransaction {
    // FOR UPDATE conflicts with the key-share lock a registration or shift
    // insert takes on its parent row, so those inserts wait for this
    // transaction and then see the parent gone.
    async fn lock_shift(&mut self, shift_id: ShiftId) -> StoreResult<bool> {
        let locked = sqlx::query("SELECT id FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(shift_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(locked.is_some())
    }

    async fn lock_event(&mut self, event_id: EventId) -> StoreResult<bool> {
        let locked = sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }
        sqlx::query("SELECT id FROM shifts WHERE event_id = $1 FOR UPDATE")
            .bind(event_id.value())
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(true)
    }

    async fn get_shift(&mut self, id: ShiftId) -> StoreResult<Option<Shift>> {
        fetch_shift(&mut *self.tx, id).await
    }

    async fn update_shift_details(&mut self, shift: &Shift) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE shifts SET ordinal = $1, name = $2, description = $3, start_time = $4, end_time = $5 WHERE id = $6",
        )
        .bind(shift.ordinal)
        .bind(&shift.name)
        .bind(&shift.description)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.id.value())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn try_reserve_spot(&mut self, shift_id: ShiftId) -> StoreResult<bool> {
        reserve_spot(&mut *self.tx, shift_id).await
    }

    async fn release_spot(&mut self, shift_id: ShiftId) -> StoreResult<bool> {
        release_spot(&mut *self.tx, shift_id).await
    }

    async fn try_resize_capacity(&mut self, shift_id: ShiftId, capacity: i32) -> StoreResult<bool> {
        resize_capacity(&mut *self.tx, shift_id, capacity).await
    }

    async fn insert_registration(&mut self, registration: &Registration) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO volunteer_registrations ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            REGISTRATION_COLUMNS
        ))
        .bind(registration.id.value())
        .bind(registration.shift_id.value())
        .bind(&registration.name)
        .bind(registration.email.as_str())
        .bind(&registration.phone)
        .bind(registration.registered_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_registration(&mut self, id: RegistrationId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM volunteer_registrations WHERE id = $1")
            .bind(id.value())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_registrations(&mut self, shift_id: ShiftId) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM volunteer_registrations WHERE shift_id = $1")
                .bind(shift_id.value())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_event_registrations(&mut self, event_id: EventId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM volunteer_registrations r JOIN shifts s ON s.id = r.shift_id WHERE s.event_id = $1",
        )
        .bind(event_id.value())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_registrations_for_shift(&mut self, shift_id: ShiftId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM volunteer_registrations WHERE shift_id = $1")
            .bind(shift_id.value())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_registrations_for_event(&mut self, event_id: EventId) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM volunteer_registrations r USING shifts s WHERE s.id = r.shift_id AND s.event_id = $1",
        )
        .bind(event_id.value())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_shift(&mut self, shift_id: ShiftId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM shifts WHERE id = $1")
            .bind(shift_id.value())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_shifts_for_event(&mut self, event_id: EventId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM shifts WHERE event_id = $1")
            .bind(event_id.value())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_event(&mut self, event_id: EventId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id.value())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
