mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_create_business_rejects_unknown_timezone() {
    let app = TestApp::new().await;

    let (status, _) = app.post("/api/v1/businesses", json!({
        "name": "Nowhere",
        "timezone": "Mars/Olympus_Mons"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/api/v1/businesses", json!({
        "name": "Berlin Branch",
        "timezone": "Europe/Berlin"
    })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["timezone"], "Europe/Berlin");
}

#[tokio::test]
async fn test_unknown_business_is_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/v1/does-not-exist/resources").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_business_hours_validation() {
    let app = TestApp::new().await;
    let business_id = app.create_business().await;
    let uri = format!("/api/v1/{}/hours", business_id);

    let (status, _) = app.put(&uri, json!({ "hours": [
        { "weekday": 0, "open_time": "18:00:00", "close_time": "09:00:00" }
    ]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put(&uri, json!({ "hours": [
        { "weekday": 7, "open_time": "09:00:00", "close_time": "17:00:00" }
    ]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put(&uri, json!({ "hours": [
        { "weekday": 1, "open_time": "09:00:00", "close_time": "17:00:00" },
        { "weekday": 1, "open_time": "10:00:00", "close_time": "12:00:00" }
    ]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get(&format!("/api/v1/{}", business_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_holiday_closes_the_calendar() {
    let app = TestApp::new().await;
    let business_id = app.create_business().await;
    let resource_id = app.create_resource(&business_id, "Room A", 1).await;

    let (status, _) = app.post(&format!("/api/v1/{}/holidays", business_id), json!({
        "date": "2025-05-05",
        "name": "Spring Bank Holiday"
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get(&format!(
        "/api/v1/{}/resources/{}/calendar?date=2025-05-05", business_id, resource_id
    )).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["windows"].as_array().unwrap().is_empty());

    // The following Monday is a normal working day
    let (_, body) = app.get(&format!(
        "/api/v1/{}/resources/{}/calendar?date=2025-05-12", business_id, resource_id
    )).await;
    let windows = body["windows"].as_array().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0]["start"], "2025-05-12T09:00:00");
    assert_eq!(windows[0]["end"], "2025-05-12T18:00:00");
}

#[tokio::test]
async fn test_resource_hours_and_exception_shape_calendar() {
    let app = TestApp::new().await;
    let business_id = app.create_business().await;
    let resource_id = app.create_resource(&business_id, "Dr. Lee", 1).await;

    let (status, _) = app.put(&format!("/api/v1/{}/resources/{}/hours", business_id, resource_id), json!({
        "hours": [{ "weekday": 0, "start_time": "08:00:00", "end_time": "14:00:00" }]
    })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post(&format!("/api/v1/{}/resources/{}/exceptions", business_id, resource_id), json!({
        "start_at": "2025-05-12T11:00:00Z",
        "end_at": "2025-05-12T12:00:00Z",
        "reason": "training"
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get(&format!(
        "/api/v1/{}/resources/{}/calendar?date=2025-05-12", business_id, resource_id
    )).await;
    let windows = body["windows"].as_array().unwrap();
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0]["start"], "2025-05-12T09:00:00");
    assert_eq!(windows[0]["end"], "2025-05-12T11:00:00");
    assert_eq!(windows[1]["start"], "2025-05-12T12:00:00");
    assert_eq!(windows[1]["end"], "2025-05-12T14:00:00");

    // No Tuesday hours for this resource
    let (_, body) = app.get(&format!(
        "/api/v1/{}/resources/{}/calendar?date=2025-05-13", business_id, resource_id
    )).await;
    assert!(body["windows"].as_array().unwrap().is_empty());

    let (status, _) = app.post(&format!("/api/v1/{}/resources/{}/exceptions", business_id, resource_id), json!({
        "start_at": "2025-05-12T12:00:00Z",
        "end_at": "2025-05-12T11:00:00Z"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_service_validation_and_listing() {
    let app = TestApp::new().await;
    let business_id = app.create_business().await;
    let uri = format!("/api/v1/{}/services", business_id);

    let (status, _) = app.post(&uri, json!({
        "name": "Broken", "duration_min": 0, "base_price_cents": 100, "currency": "USD"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&uri, json!({
        "name": "Broken", "duration_min": 30, "base_price_cents": 100, "currency": "usd"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&uri, json!({
        "name": "Broken", "duration_min": 30, "buffer_after_min": -5, "base_price_cents": 100, "currency": "USD"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post(&uri, json!({
        "name": "Haircut", "duration_min": 30, "buffer_after_min": 10, "base_price_cents": 4500, "currency": "EUR"
    })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["buffer_after_min"], 10);

    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    let services = body.as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["name"], "Haircut");
}

#[tokio::test]
async fn test_cancellation_policy_rules() {
    let app = TestApp::new().await;
    let business_id = app.create_business().await;
    let uri = format!("/api/v1/{}/cancellation-policies", business_id);

    let (status, _) = app.post(&uri, json!({
        "name": "Too harsh", "hours_before": 24, "penalty_percent": 101
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&uri, json!({
        "name": "Standard", "hours_before": 24, "penalty_percent": 50, "is_default": true
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.post(&uri, json!({
        "name": "Second default", "hours_before": 48, "penalty_percent": 100, "is_default": true
    })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.post(&uri, json!({
        "name": "Lenient", "hours_before": 2, "penalty_percent": 10
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get(&uri).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
