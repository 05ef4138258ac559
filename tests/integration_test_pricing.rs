mod common;

use axum::http::StatusCode;
use chrono::Weekday;
use common::{at, upcoming, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_price_preview_without_rules_is_base_price() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;

    let (status, body) = app.get(&format!(
        "/api/v1/{}/services/{}/price?date=2025-05-17&time=10:00:00",
        setup.business_id, setup.service_id
    )).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["base_price_cents"], 10000);
    assert_eq!(body["effective_price_cents"], 10000);
    assert!(body["applied_rule"].is_null());
}

#[tokio::test]
async fn test_highest_priority_rule_wins() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let rules_uri = format!("/api/v1/{}/services/{}/pricing-rules", setup.business_id, setup.service_id);

    let (status, _) = app.post(&rules_uri, json!({
        "name": "Weekend surcharge",
        "days": ["Sat", "Sun"],
        "modifier_type": "percentage",
        "modifier_value": 15,
        "priority": 1
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.post(&rules_uri, json!({
        "name": "Evening discount",
        "start_time": "17:00:00",
        "end_time": "20:00:00",
        "modifier_type": "fixed",
        "modifier_value": -500,
        "priority": 5
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    let preview = |date: &str, time: &str| format!(
        "/api/v1/{}/services/{}/price?date={}&time={}",
        setup.business_id, setup.service_id, date, time
    );

    // Saturday morning: only the weekend rule matches
    let (_, body) = app.get(&preview("2025-05-17", "10:00:00")).await;
    assert_eq!(body["effective_price_cents"], 11500);
    assert_eq!(body["applied_rule"]["name"], "Weekend surcharge");

    // Saturday evening: both match, the higher priority applies alone
    let (_, body) = app.get(&preview("2025-05-17", "18:00:00")).await;
    assert_eq!(body["effective_price_cents"], 9500);
    assert_eq!(body["applied_rule"]["name"], "Evening discount");

    // Monday midday: nothing matches
    let (_, body) = app.get(&preview("2025-05-12", "12:00:00")).await;
    assert_eq!(body["effective_price_cents"], 10000);

    let (_, rules) = app.get(&rules_uri).await;
    assert_eq!(rules.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_booking_price_is_locked_at_creation() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let rules_uri = format!("/api/v1/{}/services/{}/pricing-rules", setup.business_id, setup.service_id);
    let saturday = upcoming(Weekday::Sat);

    app.post(&rules_uri, json!({
        "name": "Weekend surcharge",
        "days": ["Sat"],
        "modifier_type": "percentage",
        "modifier_value": 20,
        "priority": 1
    })).await;

    let (status, booking) = app.book(&setup, &at(saturday, 10, 0), "cust-1").await;
    assert_eq!(status, StatusCode::CREATED, "{}", booking);
    assert_eq!(booking["price_cents"], 12000);
    assert!(booking["applied_rule_id"].is_string());

    app.post(&rules_uri, json!({
        "name": "Flash sale",
        "modifier_type": "percentage",
        "modifier_value": -50,
        "priority": 10
    })).await;

    let (_, fetched) = app.get(&format!(
        "/api/v1/{}/bookings/{}", setup.business_id, booking["id"].as_str().unwrap()
    )).await;
    assert_eq!(fetched["price_cents"], 12000);
}

#[tokio::test]
async fn test_discount_never_goes_below_zero() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;

    app.post(&format!("/api/v1/{}/services/{}/pricing-rules", setup.business_id, setup.service_id), json!({
        "name": "Free day",
        "start_date": "2025-05-12",
        "end_date": "2025-05-12",
        "modifier_type": "fixed",
        "modifier_value": -25000
    })).await;

    let (_, body) = app.get(&format!(
        "/api/v1/{}/services/{}/price?date=2025-05-12&time=10:00:00",
        setup.business_id, setup.service_id
    )).await;
    assert_eq!(body["effective_price_cents"], 0);
}

#[tokio::test]
async fn test_rule_validation() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let rules_uri = format!("/api/v1/{}/services/{}/pricing-rules", setup.business_id, setup.service_id);

    let (status, _) = app.post(&rules_uri, json!({
        "name": "Half a window",
        "start_time": "17:00:00",
        "modifier_type": "fixed",
        "modifier_value": 100
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&rules_uri, json!({
        "name": "Backwards",
        "start_date": "2025-06-01",
        "end_date": "2025-05-01",
        "modifier_type": "fixed",
        "modifier_value": 100
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An empty window would otherwise read as wrapping the whole day
    let (status, _) = app.post(&rules_uri, json!({
        "name": "Empty window",
        "start_time": "17:00:00",
        "end_time": "17:00:00",
        "modifier_type": "fixed",
        "modifier_value": 100
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, rules) = app.get(&rules_uri).await;
    assert!(rules.as_array().unwrap().is_empty());
}
