use axum::{extract::{State, Path}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::{
    requests::{CreateGroupBody, GroupMemberRequest, SetSharesRequest},
    responses::GroupBookingResponse,
};
use crate::domain::services::booking_engine::CreateGroupRequest;
use crate::error::AppError;
use chrono::Utc;
use std::sync::Arc;

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CreateGroupBody>,
) -> Result<impl IntoResponse, AppError> {
    let request = CreateGroupRequest {
        booking: payload.booking.into_request(business_id),
        min_participants: payload.min_participants,
        max_participants: payload.max_participants,
        payment_split_type: payload.payment_split_type,
    };
    let (booking, details) = state.engine.create_group_booking(&request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(GroupBookingResponse { booking, details })))
}

pub async fn get_group(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, group_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.groups.get(&business_id, &group_id).await?;
    Ok(Json(details))
}

pub async fn join_group(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, group_id)): Path<(String, String)>,
    Json(payload): Json<GroupMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.groups.join(&business_id, &group_id, &payload.customer_id, Utc::now()).await?;
    Ok(Json(details))
}

pub async fn leave_group(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, group_id)): Path<(String, String)>,
    Json(payload): Json<GroupMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.groups.leave(&business_id, &group_id, &payload.customer_id, Utc::now()).await?;
    Ok(Json(details))
}

pub async fn confirm_group(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, group_id)): Path<(String, String)>,
    Json(payload): Json<GroupMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.groups.confirm(&business_id, &group_id, &payload.customer_id, Utc::now()).await?;
    Ok(Json(details))
}

pub async fn set_shares(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, group_id)): Path<(String, String)>,
    Json(payload): Json<SetSharesRequest>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.groups
        .set_shares(&business_id, &group_id, &payload.customer_id, &payload.shares, Utc::now())
        .await?;
    Ok(Json(details))
}
