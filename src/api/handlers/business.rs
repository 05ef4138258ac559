use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::requests::{CreateBusinessRequest, CreateHolidayRequest, ReplaceBusinessHoursRequest};
use crate::domain::models::business::{Business, BusinessHours, Holiday};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

pub async fn create_business(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBusinessRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let business = Business::new(payload.name, payload.timezone);
    let created = state.business_repo.create(&business).await?;
    info!(business_id = %created.id, timezone = %created.timezone, "Created business");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_business(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
) -> Result<impl IntoResponse, AppError> {
    let business = state.business_repo.find_by_id(&business_id).await?
        .ok_or_else(|| AppError::NotFound(format!("Business {} not found", business_id)))?;
    let hours = state.business_repo.list_hours(&business_id).await?;
    Ok(Json(serde_json::json!({ "business": business, "hours": hours })))
}

pub async fn replace_hours(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<ReplaceBusinessHoursRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let hours: Vec<BusinessHours> = payload.hours.into_iter()
        .map(|h| BusinessHours {
            business_id: business_id.clone(),
            weekday: h.weekday,
            open_time: h.open_time,
            close_time: h.close_time,
            is_closed: h.is_closed,
        })
        .collect();
    let saved = state.business_repo.replace_hours(&business_id, &hours).await?;
    info!("Replaced {} weekday hours rows", saved.len());
    Ok(Json(saved))
}

pub async fn add_holiday(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CreateHolidayRequest>,
) -> Result<impl IntoResponse, AppError> {
    let holiday = Holiday::new(business_id, payload.date, payload.name);
    let created = state.business_repo.add_holiday(&holiday).await?;
    info!(date = %created.date, "Added holiday");
    Ok((StatusCode::CREATED, Json(created)))
}
