use booking_engine::{
    api::router::create_router,
    config::{Config, EngineSettings},
    infra::factory::sqlite_state,
    state::AppState,
};
use sqlx::{sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions}, Pool, Sqlite};
use std::sync::Arc;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    Router,
};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use tower::ServiceExt;
use serde_json::{json, Value};

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            log_dir: "./logs".to_string(),
            sweep_interval_secs: 60,
            engine: EngineSettings::default(),
        };

        let state = Arc::new(sqlite_state(&config, pool.clone()));
        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
        }
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body), &[]).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(body), &[]).await
    }

    /// Business in UTC, open 09:00-18:00 every day of the week.
    pub async fn create_business(&self) -> String {
        let (status, body) = self.post("/api/v1/businesses", json!({
            "name": "Studio North",
            "timezone": "UTC"
        })).await;
        assert_eq!(status, StatusCode::CREATED, "create business: {}", body);
        let business_id = body["id"].as_str().unwrap().to_string();

        let hours: Vec<Value> = (0..7).map(|weekday| json!({
            "weekday": weekday,
            "open_time": "09:00:00",
            "close_time": "18:00:00"
        })).collect();
        let (status, body) = self.put(&format!("/api/v1/{}/hours", business_id), json!({ "hours": hours })).await;
        assert_eq!(status, StatusCode::OK, "replace hours: {}", body);

        business_id
    }

    pub async fn create_resource(&self, business_id: &str, name: &str, capacity: i32) -> String {
        let (status, body) = self.post(&format!("/api/v1/{}/resources", business_id), json!({
            "name": name,
            "resource_type": "room",
            "capacity": capacity
        })).await;
        assert_eq!(status, StatusCode::CREATED, "create resource: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Creates a service and maps `resource_id` to it as a required resource.
    pub async fn create_service(&self, business_id: &str, resource_id: &str, service: Value) -> String {
        let (status, body) = self.post(&format!("/api/v1/{}/services", business_id), service).await;
        assert_eq!(status, StatusCode::CREATED, "create service: {}", body);
        let service_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = self.post(
            &format!("/api/v1/{}/services/{}/resources", business_id, service_id),
            json!({ "resource_id": resource_id, "is_required": true }),
        ).await;
        assert!(status.is_success(), "assign resource: {}", body);

        service_id
    }

    /// Business, one room and a 60 minute service priced at 100.00 USD.
    pub async fn standard_setup(&self) -> Setup {
        let business_id = self.create_business().await;
        let resource_id = self.create_resource(&business_id, "Room A", 4).await;
        let service_id = self.create_service(&business_id, &resource_id, json!({
            "name": "Massage",
            "duration_min": 60,
            "base_price_cents": 10000,
            "currency": "USD"
        })).await;
        Setup { business_id, resource_id, service_id }
    }

    pub async fn book(&self, setup: &Setup, start: &str, customer_id: &str) -> (StatusCode, Value) {
        self.post(&format!("/api/v1/{}/bookings", setup.business_id), json!({
            "service_id": setup.service_id,
            "customer_id": customer_id,
            "start": start
        })).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}

#[allow(dead_code)]
pub struct Setup {
    pub business_id: String,
    pub resource_id: String,
    pub service_id: String,
}

/// The next `weekday` at least two days from today, so every slot on it is
/// safely in the future.
#[allow(dead_code)]
pub fn upcoming(weekday: Weekday) -> NaiveDate {
    let mut date = Utc::now().date_naive() + chrono::Duration::days(2);
    while date.weekday() != weekday {
        date = date.succ_opt().unwrap();
    }
    date
}

/// RFC 3339 UTC instant for a local time on `date` (test businesses run in UTC).
#[allow(dead_code)]
pub fn at(date: NaiveDate, hour: u32, minute: u32) -> String {
    format!("{}T{:02}:{:02}:00Z", date, hour, minute)
}
