use axum::{extract::{State, Path}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::requests::CreateWaitlistRequest;
use crate::domain::models::waitlist::{NewWaitlistParams, WaitlistPriority};
use crate::error::AppError;
use chrono::Utc;
use std::sync::Arc;

pub async fn add_entry(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CreateWaitlistRequest>,
) -> Result<impl IntoResponse, AppError> {
    let params = NewWaitlistParams {
        business_id,
        service_id: payload.service_id,
        customer_id: payload.customer_id,
        resource_id: payload.resource_id,
        preferred_date: payload.preferred_date,
        preferred_start: payload.preferred_start,
        preferred_end: payload.preferred_end,
        priority: payload.priority.unwrap_or(WaitlistPriority::Normal),
    };
    let entry = state.waitlist.add(params, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.waitlist.list(&business_id, Utc::now()).await?;
    Ok(Json(entries))
}

pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, entry_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.waitlist.get(&business_id, &entry_id, Utc::now()).await?;
    Ok(Json(entry))
}

pub async fn cancel_entry(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, entry_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.waitlist.cancel(&business_id, &entry_id, Utc::now()).await?;
    Ok(Json(entry))
}
