mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use booking_engine::background::run_sweep;
use booking_engine::config::EngineSettings;
use booking_engine::domain::models::waitlist::{WaitlistEntry, WaitlistTransition};
use booking_engine::domain::ports::{AuditSink, WaitlistRepository};
use booking_engine::domain::services::booking_engine::BookingEngine;
use booking_engine::domain::services::waitlist::WaitlistManager;
use booking_engine::error::AppError;
use booking_engine::infra::audit::TracingAuditSink;
use booking_engine::infra::factory::sqlite_repositories;
use booking_engine::infra::repositories::sqlite_waitlist_repo::SqliteWaitlistRepo;
use chrono::{Duration, NaiveDate, Utc, Weekday};
use common::{at, upcoming, Setup, TestApp};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

async fn join_waitlist(app: &TestApp, setup: &Setup, customer_id: &str, date: &str, priority: &str) -> Value {
    let (status, body) = app.post(&format!("/api/v1/{}/waitlist", setup.business_id), json!({
        "service_id": setup.service_id,
        "customer_id": customer_id,
        "preferred_date": date,
        "priority": priority
    })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

async fn cancel_booking(app: &TestApp, setup: &Setup, booking: &Value) {
    let (status, body) = app.post(
        &format!("/api/v1/{}/bookings/{}/cancel", setup.business_id, booking["id"].as_str().unwrap()),
        json!({ "reason": "changed plans" }),
    ).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_freed_slot_goes_to_highest_priority() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);
    let date = monday.to_string();

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-holder").await;
    let high = join_waitlist(&app, &setup, "cust-high", &date, "high").await;
    let vip = join_waitlist(&app, &setup, "cust-vip", &date, "vip").await;

    cancel_booking(&app, &setup, &booking).await;

    let (_, vip_entry) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, vip["id"].as_str().unwrap())).await;
    assert_eq!(vip_entry["status"], "notified");
    assert_eq!(vip_entry["notification_count"], 1);
    assert!(vip_entry["response_deadline"].is_string());

    let (_, high_entry) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, high["id"].as_str().unwrap())).await;
    assert_eq!(high_entry["status"], "active");

    let (_, outbox) = app.get(&format!("/api/v1/{}/notifications", setup.business_id)).await;
    let offers: Vec<&Value> = outbox.as_array().unwrap().iter()
        .filter(|n| n["kind"] == "waitlist_offer")
        .collect();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["payload"]["customer_id"], "cust-vip");
    assert_eq!(offers[0]["payload"]["slot_start"].as_str().unwrap(), at(monday, 10, 0));
}

#[tokio::test]
async fn test_notified_entry_converts_into_booking() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-holder").await;
    let entry = join_waitlist(&app, &setup, "cust-wait", &monday.to_string(), "normal").await;
    let entry_id = entry["id"].as_str().unwrap();
    cancel_booking(&app, &setup, &booking).await;

    let uri = format!("/api/v1/{}/bookings", setup.business_id);

    // Somebody else cannot claim the offer
    let (status, _) = app.post(&uri, json!({
        "service_id": setup.service_id,
        "customer_id": "cust-other",
        "start": at(monday, 10, 0),
        "waitlist_entry_id": entry_id
    })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, converted) = app.post(&uri, json!({
        "service_id": setup.service_id,
        "customer_id": "cust-wait",
        "start": at(monday, 10, 0),
        "waitlist_entry_id": entry_id
    })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", converted);
    assert_eq!(converted["waitlist_entry_id"], entry_id);

    let (_, entry) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, entry_id)).await;
    assert_eq!(entry["status"], "converted");
    assert_eq!(entry["converted_booking_id"], converted["id"]);

    // A converted entry cannot be used twice
    let tuesday = monday.succ_opt().unwrap();
    let (status, _) = app.post(&uri, json!({
        "service_id": setup.service_id,
        "customer_id": "cust-wait",
        "start": at(tuesday, 10, 0),
        "waitlist_entry_id": entry_id
    })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_active_entry_cannot_convert() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);
    let entry = join_waitlist(&app, &setup, "cust-wait", &monday.to_string(), "normal").await;

    let (status, _) = app.post(&format!("/api/v1/{}/bookings", setup.business_id), json!({
        "service_id": setup.service_id,
        "customer_id": "cust-wait",
        "start": at(monday, 10, 0),
        "waitlist_entry_id": entry["id"]
    })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_preferred_window_limits_offers() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-holder").await;
    let (status, afternoon) = app.post(&format!("/api/v1/{}/waitlist", setup.business_id), json!({
        "service_id": setup.service_id,
        "customer_id": "cust-pm",
        "preferred_date": monday.to_string(),
        "preferred_start": "14:00:00",
        "preferred_end": "18:00:00",
        "priority": "vip"
    })).await;
    assert_eq!(status, StatusCode::CREATED);

    cancel_booking(&app, &setup, &booking).await;

    let (_, entry) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, afternoon["id"].as_str().unwrap())).await;
    assert_eq!(entry["status"], "active");
}

#[tokio::test]
async fn test_waitlist_validation_and_cancel() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let uri = format!("/api/v1/{}/waitlist", setup.business_id);

    let (status, _) = app.post(&uri, json!({
        "service_id": setup.service_id,
        "customer_id": "cust-1",
        "preferred_date": "2020-01-06"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let monday = upcoming(Weekday::Mon);
    let (status, _) = app.post(&uri, json!({
        "service_id": setup.service_id,
        "customer_id": "cust-1",
        "preferred_date": monday.to_string(),
        "preferred_start": "15:00:00",
        "preferred_end": "12:00:00"
    })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, entry) = app.post(&uri, json!({
        "service_id": setup.service_id,
        "customer_id": "cust-1",
        "preferred_date": monday.to_string()
    })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["priority"], "normal");

    let cancel_uri = format!("{}/{}/cancel", uri, entry["id"].as_str().unwrap());
    let (status, body) = app.send("POST", &cancel_uri, None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, _) = app.send("POST", &cancel_uri, None, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, list) = app.get(&uri).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sweep_expires_exhausted_offers() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);
    let entry = join_waitlist(&app, &setup, "cust-slow", &monday.to_string(), "normal").await;
    let entry_id = entry["id"].as_str().unwrap();

    // Last offer went out and its deadline passed without a reply
    let lapsed = Utc::now() - Duration::minutes(5);
    sqlx::query(
        "UPDATE waitlist_entries SET status = 'notified', notification_count = 3, \
         last_notified_at = ?, response_deadline = ? WHERE id = ?"
    )
        .bind(lapsed - Duration::hours(2))
        .bind(lapsed)
        .bind(entry_id)
        .execute(&app.pool)
        .await
        .unwrap();

    run_sweep(&app.state).await;

    let (_, entry) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, entry_id)).await;
    assert_eq!(entry["status"], "expired");
}

#[tokio::test]
async fn test_lapsed_offer_is_passed_on() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);
    let date = monday.to_string();

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-holder").await;
    let first = join_waitlist(&app, &setup, "cust-first", &date, "high").await;
    let second = join_waitlist(&app, &setup, "cust-second", &date, "normal").await;

    // The first entry already used all its offers and let the last one lapse
    let lapsed = Utc::now() - Duration::minutes(1);
    sqlx::query(
        "UPDATE waitlist_entries SET status = 'notified', notification_count = 3, response_deadline = ? WHERE id = ?"
    )
        .bind(lapsed)
        .bind(first["id"].as_str().unwrap())
        .execute(&app.pool)
        .await
        .unwrap();

    cancel_booking(&app, &setup, &booking).await;

    let (_, first) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, first["id"].as_str().unwrap())).await;
    assert_eq!(first["status"], "expired");
    let (_, second) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, second["id"].as_str().unwrap())).await;
    assert_eq!(second["status"], "notified");
}

/// Reads open entries, then lets a concurrent reader expire the lapsed ones
/// before the caller writes.
struct ExpiringAfterRead {
    inner: SqliteWaitlistRepo,
    pool: SqlitePool,
}

#[async_trait]
impl WaitlistRepository for ExpiringAfterRead {
    async fn create(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError> {
        self.inner.create(entry).await
    }

    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<WaitlistEntry>, AppError> {
        self.inner.find_by_id(business_id, id).await
    }

    async fn list(&self, business_id: &str) -> Result<Vec<WaitlistEntry>, AppError> {
        self.inner.list(business_id).await
    }

    async fn list_open_for_date(&self, business_id: &str, service_id: &str, date: NaiveDate) -> Result<Vec<WaitlistEntry>, AppError> {
        let entries = self.inner.list_open_for_date(business_id, service_id, date).await?;
        sqlx::query("UPDATE waitlist_entries SET status = 'expired' WHERE status = 'notified' AND notification_count >= 3")
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(entries)
    }

    async fn list_open(&self, limit: i64) -> Result<Vec<WaitlistEntry>, AppError> {
        self.inner.list_open(limit).await
    }

    async fn apply(&self, transitions: &[WaitlistTransition]) -> Result<(), AppError> {
        self.inner.apply(transitions).await
    }
}

#[tokio::test]
async fn test_cancellation_survives_entry_expired_concurrently() {
    let app = TestApp::new().await;
    let setup = app.standard_setup().await;
    let monday = upcoming(Weekday::Mon);
    let date = monday.to_string();

    let (_, booking) = app.book(&setup, &at(monday, 10, 0), "cust-holder").await;
    let lapsed = join_waitlist(&app, &setup, "cust-lapsed", &date, "high").await;
    let next = join_waitlist(&app, &setup, "cust-next", &date, "normal").await;

    sqlx::query(
        "UPDATE waitlist_entries SET status = 'notified', notification_count = 3, response_deadline = ? WHERE id = ?"
    )
        .bind(Utc::now() - Duration::minutes(1))
        .bind(lapsed["id"].as_str().unwrap())
        .execute(&app.pool)
        .await
        .unwrap();

    let settings = EngineSettings::default();
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let mut repos = sqlite_repositories(&app.pool);
    repos.waitlist = Arc::new(ExpiringAfterRead {
        inner: SqliteWaitlistRepo::new(app.pool.clone()),
        pool: app.pool.clone(),
    });
    let manager = Arc::new(WaitlistManager::new(
        repos.waitlist.clone(),
        repos.businesses.clone(),
        repos.services.clone(),
        repos.resources.clone(),
        audit.clone(),
        &settings,
    ));
    let engine = BookingEngine::new(repos, manager, audit, settings);

    let outcome = engine
        .cancel_booking(&setup.business_id, booking["id"].as_str().unwrap(), None, Utc::now())
        .await;
    assert!(outcome.is_ok(), "{:?}", outcome.err());

    let (_, cancelled) = app.get(&format!("/api/v1/{}/bookings/{}", setup.business_id, booking["id"].as_str().unwrap())).await;
    assert_eq!(cancelled["status"], "cancelled");
    let (_, lapsed) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, lapsed["id"].as_str().unwrap())).await;
    assert_eq!(lapsed["status"], "expired");
    let (_, next) = app.get(&format!("/api/v1/{}/waitlist/{}", setup.business_id, next["id"].as_str().unwrap())).await;
    assert_eq!(next["status"], "notified");
}
