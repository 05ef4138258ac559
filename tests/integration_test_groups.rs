mod common;

use axum::http::StatusCode;
use chrono::{DateTime, TimeZone, Utc, Weekday};
use common::{at, upcoming, Setup, TestApp};
use serde_json::{json, Value};

async fn create_group(app: &TestApp, setup: &Setup, start: &str, min: i32, max: i32, split: &str) -> (StatusCode, Value) {
    app.post(&format!("/api/v1/{}/groups", setup.business_id), json!({
        "service_id": setup.service_id,
        "customer_id": "organizer",
        "start": start,
        "min_participants": min,
        "max_participants": max,
        "payment_split_type": split
    })).await
}

fn amounts(details: &Value) -> Vec<i64> {
    details["participants"].as_array().unwrap()
        .iter()
        .filter(|p| p["status"] == "joined")
        .map(|p| p["amount_owed_cents"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_split_equal_gives_remainder_to_organizer() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (status, created) = create_group(&app, &setup, &at(monday, 10, 0), 2, 3, "split_equal").await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["group"]["current_participants"], 1);
    assert_eq!(created["group"]["total_amount_cents"], 10000);
    assert_eq!(created["booking"]["price_cents"], 10000);

    let group_uri = format!("/api/v1/{}/groups/{}", setup.business_id, created["group"]["id"].as_str().unwrap());
    for customer in ["guest-1", "guest-2"] {
        let (status, _) = app.post(&format!("{}/join", group_uri), json!({ "customer_id": customer })).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, details) = app.get(&group_uri).await;
    assert_eq!(details["group"]["current_participants"], 3);
    assert_eq!(amounts(&details), vec![3334, 3333, 3333]);
    assert_eq!(amounts(&details).iter().sum::<i64>(), 10000);

    let (status, _) = app.post(&format!("{}/join", group_uri), json!({ "customer_id": "guest-3" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_duplicate_join_is_rejected() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, created) = create_group(&app, &setup, &at(monday, 10, 0), 1, 4, "organizer_pays").await;
    let join_uri = format!("/api/v1/{}/groups/{}/join", setup.business_id, created["group"]["id"].as_str().unwrap());

    let (status, details) = app.post(&join_uri, json!({ "customer_id": "guest-1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amounts(&details), vec![10000, 0]);

    let (status, _) = app.post(&join_uri, json!({ "customer_id": "guest-1" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_group_size_is_bounded_by_resource_capacity() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (status, _) = create_group(&app, &setup, &at(monday, 10, 0), 2, 5, "split_equal").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_group(&app, &setup, &at(monday, 10, 0), 3, 2, "split_equal").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was booked by the rejected attempts
    let (status, _) = create_group(&app, &setup, &at(monday, 10, 0), 1, 4, "split_equal").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_confirm_rules() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, created) = create_group(&app, &setup, &at(monday, 10, 0), 2, 4, "split_equal").await;
    let group_uri = format!("/api/v1/{}/groups/{}", setup.business_id, created["group"]["id"].as_str().unwrap());

    // Below the minimum
    let (status, _) = app.post(&format!("{}/confirm", group_uri), json!({ "customer_id": "organizer" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.post(&format!("{}/join", group_uri), json!({ "customer_id": "guest-1" })).await;

    let (status, _) = app.post(&format!("{}/confirm", group_uri), json!({ "customer_id": "guest-1" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, details) = app.post(&format!("{}/confirm", group_uri), json!({ "customer_id": "organizer" })).await;
    assert_eq!(status, StatusCode::OK, "{}", details);
    assert_eq!(details["group"]["status"], "confirmed");

    let (_, booking) = app.get(&format!(
        "/api/v1/{}/bookings/{}", setup.business_id, created["booking"]["id"].as_str().unwrap()
    )).await;
    assert_eq!(booking["status"], "confirmed");

    // A confirmed group of two at minimum two cannot shrink
    let (status, _) = app.post(&format!("{}/leave", group_uri), json!({ "customer_id": "guest-1" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.post(&format!("{}/confirm", group_uri), json!({ "customer_id": "organizer" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, outbox) = app.get(&format!("/api/v1/{}/notifications", setup.business_id)).await;
    assert!(outbox.as_array().unwrap().iter().any(|n| n["kind"] == "group_confirmed"));
}

#[tokio::test]
async fn test_leave_recomputes_shares() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, created) = create_group(&app, &setup, &at(monday, 10, 0), 1, 4, "split_equal").await;
    let group_uri = format!("/api/v1/{}/groups/{}", setup.business_id, created["group"]["id"].as_str().unwrap());

    for customer in ["guest-1", "guest-2", "guest-3"] {
        app.post(&format!("{}/join", group_uri), json!({ "customer_id": customer })).await;
    }
    let (_, details) = app.get(&group_uri).await;
    assert_eq!(amounts(&details), vec![2500, 2500, 2500, 2500]);

    let (status, details) = app.post(&format!("{}/leave", group_uri), json!({ "customer_id": "guest-2" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["group"]["current_participants"], 3);
    assert_eq!(amounts(&details), vec![3334, 3333, 3333]);

    let (status, _) = app.post(&format!("{}/leave", group_uri), json!({ "customer_id": "organizer" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&format!("{}/leave", group_uri), json!({ "customer_id": "stranger" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_individual_shares_must_add_up() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, created) = create_group(&app, &setup, &at(monday, 10, 0), 1, 3, "individual").await;
    let group_uri = format!("/api/v1/{}/groups/{}", setup.business_id, created["group"]["id"].as_str().unwrap());
    let (_, details) = app.post(&format!("{}/join", group_uri), json!({ "customer_id": "guest-1" })).await;

    let ids: Vec<String> = details["participants"].as_array().unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect();

    let (status, _) = app.post(&format!("{}/shares", group_uri), json!({
        "customer_id": "organizer",
        "shares": [
            { "participant_id": ids[0], "amount_owed_cents": 6000 },
            { "participant_id": ids[1], "amount_owed_cents": 3000 }
        ]
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&format!("{}/shares", group_uri), json!({
        "customer_id": "guest-1",
        "shares": [
            { "participant_id": ids[0], "amount_owed_cents": 6000 },
            { "participant_id": ids[1], "amount_owed_cents": 4000 }
        ]
    })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, details) = app.post(&format!("{}/shares", group_uri), json!({
        "customer_id": "organizer",
        "shares": [
            { "participant_id": ids[0], "amount_owed_cents": 6000 },
            { "participant_id": ids[1], "amount_owed_cents": 4000 }
        ]
    })).await;
    assert_eq!(status, StatusCode::OK, "{}", details);
    assert_eq!(amounts(&details), vec![6000, 4000]);
}

#[tokio::test]
async fn test_cancelling_the_booking_cancels_the_group() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, created) = create_group(&app, &setup, &at(monday, 10, 0), 1, 4, "split_equal").await;
    let group_uri = format!("/api/v1/{}/groups/{}", setup.business_id, created["group"]["id"].as_str().unwrap());

    let (status, _) = app.post(
        &format!("/api/v1/{}/bookings/{}/cancel", setup.business_id, created["booking"]["id"].as_str().unwrap()),
        json!({}),
    ).await;
    assert_eq!(status, StatusCode::OK);

    let (_, details) = app.get(&group_uri).await;
    assert_eq!(details["group"]["status"], "cancelled");

    let (status, _) = app.post(&format!("{}/join", group_uri), json!({ "customer_id": "late" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_group_writes_are_stamped_with_the_caller_clock() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, created) = create_group(&app, &setup, &at(monday, 10, 0), 2, 4, "split_equal").await;
    let group_id = created["group"]["id"].as_str().unwrap();
    let booking_id = created["booking"]["id"].as_str().unwrap();
    for customer in ["guest-1", "guest-2"] {
        app.post(&format!("/api/v1/{}/groups/{}/join", setup.business_id, group_id), json!({ "customer_id": customer })).await;
    }

    let left_at = Utc.with_ymd_and_hms(2020, 2, 3, 4, 5, 6).unwrap();
    let details = app.state.groups.leave(&setup.business_id, group_id, "guest-2", left_at).await.unwrap();
    assert_eq!(details.group.updated_at, left_at);

    let confirmed_at = Utc.with_ymd_and_hms(2020, 2, 3, 5, 0, 0).unwrap();
    let details = app.state.groups.confirm(&setup.business_id, group_id, "organizer", confirmed_at).await.unwrap();
    assert_eq!(details.group.updated_at, confirmed_at);

    let (_, booking) = app.get(&format!("/api/v1/{}/bookings/{}", setup.business_id, booking_id)).await;
    assert_eq!(booking["status"], "confirmed");
    let booking_updated: DateTime<Utc> = booking["updated_at"].as_str().unwrap().parse().unwrap();
    assert_eq!(booking_updated, confirmed_at);
}
