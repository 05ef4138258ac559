use axum::{extract::{State, Query}, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::{
    requests::{AvailabilityParams, CheckSlotRequest},
    responses::SlotsResponse,
};
use crate::domain::services::availability::MAX_SPAN_MINUTES;
use crate::domain::services::booking_engine::{AvailabilityQuery, SlotQuery};
use crate::error::AppError;
use chrono::Utc;
use std::sync::Arc;

pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Query(params): Query<AvailabilityParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.granularity.is_some_and(|g| !(1..=MAX_SPAN_MINUTES).contains(&g)) {
        return Err(AppError::Validation(format!("granularity must be between 1 and {}", MAX_SPAN_MINUTES)));
    }
    let query = AvailabilityQuery {
        business_id,
        service_id: params.service_id,
        resource_id: params.resource_id,
        date: params.date,
        duration_minutes: params.duration_minutes,
        granularity_minutes: params.granularity,
    };
    let slots = state.engine.list_available_slots(&query, Utc::now()).await?;
    Ok(Json(SlotsResponse { date: params.date, slots }))
}

pub async fn check_slot(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CheckSlotRequest>,
) -> Result<impl IntoResponse, AppError> {
    let query = SlotQuery {
        business_id,
        service_id: payload.service_id,
        resource_id: payload.resource_id,
        start: payload.start,
        end: payload.end,
        duration_minutes: payload.duration_minutes,
    };
    let check = state.engine.check_availability(&query, Utc::now()).await?;
    Ok(Json(check))
}
