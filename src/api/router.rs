use axum::{
    body::Body,
    extract::Request,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{availability, booking, business, group, health, policy, resource, service, waitlist};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Catalog
        .route("/api/v1/businesses", post(business::create_business))
        .route("/api/v1/{business_id}", get(business::get_business))
        .route("/api/v1/{business_id}/hours", put(business::replace_hours))
        .route("/api/v1/{business_id}/holidays", post(business::add_holiday))
        .route("/api/v1/{business_id}/resources", post(resource::create_resource).get(resource::list_resources))
        .route("/api/v1/{business_id}/resources/{resource_id}/hours", put(resource::replace_hours))
        .route("/api/v1/{business_id}/resources/{resource_id}/exceptions", post(resource::add_exception))
        .route("/api/v1/{business_id}/resources/{resource_id}/calendar", get(resource::get_calendar))
        .route("/api/v1/{business_id}/services", post(service::create_service).get(service::list_services))
        .route("/api/v1/{business_id}/services/{service_id}/resources", post(service::assign_resource))
        .route("/api/v1/{business_id}/services/{service_id}/pricing-rules", post(service::create_pricing_rule).get(service::list_pricing_rules))
        .route("/api/v1/{business_id}/services/{service_id}/price", get(service::price_preview))
        .route("/api/v1/{business_id}/cancellation-policies", post(policy::create_policy).get(policy::list_policies))

        // Availability
        .route("/api/v1/{business_id}/availability", get(availability::list_slots))
        .route("/api/v1/{business_id}/availability/check", post(availability::check_slot))

        // Bookings
        .route("/api/v1/{business_id}/bookings", post(booking::create_booking).get(booking::list_bookings))
        .route("/api/v1/{business_id}/bookings/{booking_id}", get(booking::get_booking).put(booking::reschedule_booking))
        .route("/api/v1/{business_id}/bookings/{booking_id}/status", post(booking::change_status))
        .route("/api/v1/{business_id}/bookings/{booking_id}/cancel", post(booking::cancel_booking))
        .route("/api/v1/{business_id}/notifications", get(booking::list_notifications))

        // Waitlist
        .route("/api/v1/{business_id}/waitlist", post(waitlist::add_entry).get(waitlist::list_entries))
        .route("/api/v1/{business_id}/waitlist/{entry_id}", get(waitlist::get_entry))
        .route("/api/v1/{business_id}/waitlist/{entry_id}/cancel", post(waitlist::cancel_entry))

        // Groups
        .route("/api/v1/{business_id}/groups", post(group::create_group))
        .route("/api/v1/{business_id}/groups/{group_id}", get(group::get_group))
        .route("/api/v1/{business_id}/groups/{group_id}/join", post(group::join_group))
        .route("/api/v1/{business_id}/groups/{group_id}/leave", post(group::leave_group))
        .route("/api/v1/{business_id}/groups/{group_id}/confirm", post(group::confirm_group))
        .route("/api/v1/{business_id}/groups/{group_id}/shares", post(group::set_shares))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        business_id = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .with_state(state)
}
