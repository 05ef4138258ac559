use axum::{
    extract::{State, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::{
    requests::{CancelRequest, CreateBookingBody, ListBookingsQuery, RescheduleRequest, StatusRequest},
    responses::InProgressResponse,
};
use crate::domain::services::booking_engine::CreateOutcome;
use crate::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    match headers.get(IDEMPOTENCY_HEADER) {
        None => Ok(None),
        Some(value) => value.to_str()
            .map(|v| Some(v.trim().to_string()))
            .map_err(|_| AppError::Validation("Idempotency-Key must be visible ASCII".into())),
    }
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    headers: HeaderMap,
    Json(payload): Json<CreateBookingBody>,
) -> Result<Response, AppError> {
    let key = idempotency_key(&headers)?;
    let request = payload.into_request(business_id);

    let outcome = state.engine.create_booking(&request, key.as_deref(), Utc::now()).await?;
    let response = match outcome {
        CreateOutcome::Created(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        CreateOutcome::Replayed(booking) => (StatusCode::OK, Json(booking)).into_response(),
        CreateOutcome::InProgress => {
            info!("Idempotent request still in progress");
            (StatusCode::ACCEPTED, Json(InProgressResponse {
                status: "in_progress",
                message: "A request with this Idempotency-Key is still being processed",
            })).into_response()
        }
    };
    Ok(response)
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Query(params): Query<ListBookingsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.engine.list_bookings(&business_id, params.from, params.until).await?;
    Ok(Json(bookings))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, booking_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.engine.get_booking(&business_id, &booking_id).await?;
    Ok(Json(booking))
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, booking_id)): Path<(String, String)>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.engine
        .reschedule_booking(&business_id, &booking_id, payload.start, payload.end, Utc::now())
        .await?;
    Ok(Json(booking))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, booking_id)): Path<(String, String)>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.engine
        .transition_booking(&business_id, &booking_id, payload.status, payload.reason, Utc::now())
        .await?;
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, booking_id)): Path<(String, String)>,
    Json(payload): Json<CancelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.engine.cancel_booking(&business_id, &booking_id, payload.reason, Utc::now()).await?;
    Ok(Json(outcome))
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
) -> Result<impl IntoResponse, AppError> {
    let notifications = state.notification_repo.list(&business_id).await?;
    Ok(Json(notifications))
}
