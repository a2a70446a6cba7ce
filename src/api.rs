// HTTP adapter - maps requests onto the services and errors onto responses

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    core::{EventId, OrganizationId, RegistrationId, ShiftId},
    error::{AppError, AppResult},
    infrastructure::middleware::{viewer_context_middleware, Vc},
    models::{
        DeletionImpact, Event, EventWithShifts, PublicEvent, Registration, Shift, VolunteerRecord,
    },
    services::{
        AdminContext, EventChanges, NewEvent, NewShift, OrganizationContext, RegistrationRequest,
        ShiftChanges, VolunteerFilter,
    },
};

#[derive(Debug, Deserialize)]
pub struct SwitchOrganizationRequest {
    pub organization_id: OrganizationId,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub capacity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

async fn admin_context(state: &AppState, vc: &Vc) -> AppResult<AdminContext> {
    let user_id = vc.require_user()?;
    state.resolver.require_admin(user_id).await
}

pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.storage.volunteers.health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn organization_context_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Result<Json<OrganizationContext>, AppError> {
    let user_id = vc.require_user()?;
    Ok(Json(state.resolver.resolve(user_id).await?))
}

pub async fn switch_organization_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<SwitchOrganizationRequest>,
) -> Result<Json<OrganizationContext>, AppError> {
    let user_id = vc.require_user()?;
    let ctx = state
        .resolver
        .switch_organization(user_id, req.organization_id)
        .await?;
    Ok(Json(ctx))
}

pub async fn list_events_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Result<Json<Vec<EventWithShifts>>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    Ok(Json(state.events.list_events(&ctx).await?))
}

pub async fn create_event_handler(
    State(state): State<AppState>,
    vc: Vc,
    Json(req): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let ctx = admin_context(&state, &vc).await?;
    let event = state.events.create_event(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(event_id): AxumPath<EventId>,
    Json(req): Json<EventChanges>,
) -> Result<Json<Event>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    Ok(Json(state.events.update_event(&ctx, event_id, req).await?))
}

pub async fn delete_event_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(event_id): AxumPath<EventId>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeletionImpact>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    let impact = state
        .events
        .delete_event(&ctx, event_id, params.confirm)
        .await?;
    Ok(Json(impact))
}

pub async fn event_impact_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(event_id): AxumPath<EventId>,
) -> Result<Json<DeletionImpact>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    Ok(Json(state.events.event_impact(&ctx, event_id).await?))
}

pub async fn create_shift_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(event_id): AxumPath<EventId>,
    Json(req): Json<NewShift>,
) -> Result<(StatusCode, Json<Shift>), AppError> {
    let ctx = admin_context(&state, &vc).await?;
    let shift = state.events.create_shift(&ctx, event_id, req).await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

pub async fn update_shift_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(shift_id): AxumPath<ShiftId>,
    Json(req): Json<ShiftChanges>,
) -> Result<Json<Shift>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    Ok(Json(state.events.update_shift(&ctx, shift_id, req).await?))
}

pub async fn delete_shift_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(shift_id): AxumPath<ShiftId>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeletionImpact>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    let impact = state
        .events
        .delete_shift(&ctx, shift_id, params.confirm)
        .await?;
    Ok(Json(impact))
}

pub async fn shift_impact_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(shift_id): AxumPath<ShiftId>,
) -> Result<Json<DeletionImpact>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    Ok(Json(state.events.shift_impact(&ctx, shift_id).await?))
}

pub async fn resize_shift_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(shift_id): AxumPath<ShiftId>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<Shift>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    let shift = state
        .events
        .resize_shift(&ctx, shift_id, req.capacity)
        .await?;
    Ok(Json(shift))
}

pub async fn public_event_handler(
    State(state): State<AppState>,
    AxumPath(slug): AxumPath<String>,
) -> Result<Json<PublicEvent>, AppError> {
    Ok(Json(state.events.get_public_event(&slug).await?))
}

pub async fn register_handler(
    State(state): State<AppState>,
    AxumPath(shift_id): AxumPath<ShiftId>,
    Json(req): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<Registration>), AppError> {
    let registration = state.registrations.register(shift_id, req).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn cancel_registration_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(registration_id): AxumPath<RegistrationId>,
) -> Result<Json<Value>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    state
        .registrations
        .cancel_registration(&ctx, registration_id)
        .await?;
    Ok(Json(json!({"id": registration_id, "cancelled": true})))
}

pub async fn list_volunteers_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(filter): Query<VolunteerFilter>,
) -> Result<Json<Vec<VolunteerRecord>>, AppError> {
    let ctx = admin_context(&state, &vc).await?;
    Ok(Json(state.volunteers.list(&ctx, &filter).await?))
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Organization context
        .route("/organization/context", get(organization_context_handler))
        .route("/organization/switch", post(switch_organization_handler))
        // Event administration
        .route("/events", get(list_events_handler).post(create_event_handler))
        .route(
            "/events/{id}",
            put(update_event_handler).delete(delete_event_handler),
        )
        .route("/events/{id}/impact", get(event_impact_handler))
        .route("/events/{id}/shifts", post(create_shift_handler))
        .route(
            "/shifts/{id}",
            put(update_shift_handler).delete(delete_shift_handler),
        )
        .route("/shifts/{id}/impact", get(shift_impact_handler))
        .route("/shifts/{id}/capacity", put(resize_shift_handler))
        // Public signup
        .route("/public/events/{slug}", get(public_event_handler))
        .route("/shifts/{id}/registrations", post(register_handler))
        // Volunteers
        .route("/registrations/{id}", delete(cancel_registration_handler))
        .route("/volunteers", get(list_volunteers_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(viewer_context_middleware))
        .with_state(state)
}
