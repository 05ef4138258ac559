use axum::{extract::{State, Path, Query}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::business::BusinessId;
use crate::api::dtos::requests::{AssignResourceRequest, CreatePricingRuleRequest, CreateServiceRequest, PriceQuery};
use crate::domain::models::{
    pricing::{NewPricingRuleParams, PricingRule},
    service::{NewServiceParams, Service, ServiceResource},
};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

async fn ensure_service(state: &AppState, business_id: &str, service_id: &str) -> Result<Service, AppError> {
    state.service_repo.find_by_id(business_id, service_id).await?
        .ok_or_else(|| AppError::NotFound(format!("Service {} not found", service_id)))
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Json(payload): Json<CreateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if let Some(policy_id) = &payload.cancellation_policy_id {
        let policies = state.policy_repo.list(&business_id).await?;
        if !policies.iter().any(|p| &p.id == policy_id) {
            return Err(AppError::NotFound(format!("Cancellation policy {} not found", policy_id)));
        }
    }

    let service = Service::new(NewServiceParams {
        business_id,
        name: payload.name,
        duration_min: payload.duration_min,
        buffer_before_min: payload.buffer_before_min.unwrap_or(0),
        buffer_after_min: payload.buffer_after_min.unwrap_or(0),
        base_price_cents: payload.base_price_cents,
        currency: payload.currency,
        cancellation_policy_id: payload.cancellation_policy_id,
    });
    let created = state.service_repo.create(&service).await?;
    info!(service_id = %created.id, "Created service: {}", created.name);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
) -> Result<impl IntoResponse, AppError> {
    let services = state.service_repo.list(&business_id).await?;
    Ok(Json(services))
}

pub async fn assign_resource(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, service_id)): Path<(String, String)>,
    Json(payload): Json<AssignResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_service(&state, &business_id, &service_id).await?;
    state.resource_repo.find_by_id(&business_id, &payload.resource_id).await?
        .ok_or_else(|| AppError::NotFound(format!("Resource {} not found", payload.resource_id)))?;

    let mapping = ServiceResource {
        service_id,
        resource_id: payload.resource_id,
        is_required: payload.is_required.unwrap_or(true),
    };
    let saved = state.service_repo.assign_resource(&mapping).await?;
    info!(service_id = %saved.service_id, resource_id = %saved.resource_id, is_required = saved.is_required, "Mapped resource to service");
    Ok(Json(saved))
}

pub async fn create_pricing_rule(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, service_id)): Path<(String, String)>,
    Json(payload): Json<CreatePricingRuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_service(&state, &business_id, &service_id).await?;

    let rule = PricingRule::new(NewPricingRuleParams {
        service_id,
        name: payload.name,
        days: payload.days,
        start_time: payload.start_time,
        end_time: payload.end_time,
        start_date: payload.start_date,
        end_date: payload.end_date,
        modifier_type: payload.modifier_type,
        modifier_value: payload.modifier_value,
        priority: payload.priority.unwrap_or(0),
    });
    let created = state.service_repo.create_pricing_rule(&rule).await?;
    info!(rule_id = %created.id, priority = created.priority, "Created pricing rule");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_pricing_rules(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, service_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_service(&state, &business_id, &service_id).await?;
    let rules = state.service_repo.list_pricing_rules(&service_id).await?;
    Ok(Json(rules))
}

pub async fn price_preview(
    State(state): State<Arc<AppState>>,
    BusinessId(business_id): BusinessId,
    Path((_, service_id)): Path<(String, String)>,
    Query(params): Query<PriceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let quote = state.engine.price_preview(&business_id, &service_id, params.date, params.time).await?;
    Ok(Json(quote))
}
