use axum::{extract::{State, Path, Query}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::{
    requests::{CreateExceptionRequest, CreateResourceRequest, DateQuery, ReplaceResourceHoursRequest},
    responses::CalendarResponse,
};
use crate::domain::models::resource::{Resource, ResourceException, ResourceHours};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

async fn ensure_resource(state: &AppState, business_id: &str, resource_id: &str) -> Result<Resource, AppError> {
    state.resource_repo.find_by_id(business_id, resource_id).await?
        .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", resource_id)))
}

pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let resource = Resource::new(business_id, payload.name, payload.resource_type, payload.capacity.unwrap_or(1));
    let created = state.resource_repo.create(&resource).await?;
    info!(resource_id = %created.id, resource_type = %created.resource_type, "Created resource");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
) -> Result<impl IntoResponse, AppError> {
    let resources = state.resource_repo.list(&business_id).await?;
    Ok(Json(resources))
}

pub async fn replace_hours(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, resource_id)): Path<(String, String)>,
    Json(payload): Json<ReplaceResourceHoursRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_resource(&state, &business_id, &resource_id).await?;

    let hours: Vec<ResourceHours> = payload.hours.into_iter()
        .map(|h| ResourceHours::new(resource_id.clone(), h.weekday, h.start_time, h.end_time))
        .collect();
    let saved = state.resource_repo.replace_hours(&resource_id, &hours).await?;
    info!(resource_id = %resource_id, "Replaced {} resource hours rows", saved.len());
    Ok(Json(saved))
}

pub async fn add_exception(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, resource_id)): Path<(String, String)>,
    Json(payload): Json<CreateExceptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.start_at >= payload.end_at {
        return Err(AppError::Validation("start_at must be before end_at".into()));
    }
    ensure_resource(&state, &business_id, &resource_id).await?;

    let exception = ResourceException::new(resource_id, payload.start_at, payload.end_at, payload.reason);
    let created = state.resource_repo.add_exception(&exception).await?;
    info!(resource_id = %created.resource_id, start = %created.start_at, end = %created.end_at, "Added resource exception");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, resource_id)): Path<(String, String)>,
    Query(params): Query<DateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let windows = state.engine.resolve_calendar(&business_id, Some(&resource_id), params.date).await?;
    Ok(Json(CalendarResponse { date: params.date, windows }))
}
