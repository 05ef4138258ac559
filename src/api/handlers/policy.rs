use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::requests::CreatePolicyRequest;
use crate::domain::models::cancellation::CancellationPolicy;
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CreatePolicyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let policy = CancellationPolicy::new(business_id, payload.name, payload.hours_before, payload.penalty_percent, payload.is_default);
    let created = state.policy_repo.create(&policy).await?;
    info!(policy_id = %created.id, is_default = created.is_default, "Created cancellation policy");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
) -> Result<impl IntoResponse, AppError> {
    let policies = state.policy_repo.list(&business_id).await?;
    Ok(Json(policies))
}
