use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::error::AppError;
use crate::domain::ports::{AuditSink, GroupRepository, NotificationRepository};
use crate::domain::services::booking_engine::{BookingEngine, EngineRepositories};
use crate::domain::services::group::GroupBookingAllocator;
use crate::domain::services::waitlist::WaitlistManager;
use crate::infra::audit::TracingAuditSink;
use crate::infra::repositories::{
    postgres_business_repo::PostgresBusinessRepo, postgres_resource_repo::PostgresResourceRepo,
    postgres_service_repo::PostgresServiceRepo, postgres_policy_repo::PostgresPolicyRepo,
    postgres_booking_repo::PostgresBookingRepo, postgres_waitlist_repo::PostgresWaitlistRepo,
    postgres_group_repo::PostgresGroupRepo, postgres_idempotency_repo::PostgresIdempotencyRepo,
    postgres_notification_repo::PostgresNotificationRepo,
    sqlite_business_repo::SqliteBusinessRepo, sqlite_resource_repo::SqliteResourceRepo,
    sqlite_service_repo::SqliteServiceRepo, sqlite_policy_repo::SqlitePolicyRepo,
    sqlite_booking_repo::SqliteBookingRepo, sqlite_waitlist_repo::SqliteWaitlistRepo,
    sqlite_group_repo::SqliteGroupRepo, sqlite_idempotency_repo::SqliteIdempotencyRepo,
    sqlite_notification_repo::SqliteNotificationRepo,
};

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let database_url = &config.database_url;

    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse().map_err(AppError::Database)?;
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .map_err(AppError::Database)?;

        run_postgres_migrations(&pool).await?;
        Ok(postgres_state(config, pool))
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(AppError::Database)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(AppError::Database)?;

        run_sqlite_migrations(&pool).await?;
        Ok(sqlite_state(config, pool))
    }
}

pub fn postgres_state(config: &Config, pool: PgPool) -> AppState {
    let repos = EngineRepositories {
        businesses: Arc::new(PostgresBusinessRepo::new(pool.clone())),
        resources: Arc::new(PostgresResourceRepo::new(pool.clone())),
        services: Arc::new(PostgresServiceRepo::new(pool.clone())),
        policies: Arc::new(PostgresPolicyRepo::new(pool.clone())),
        bookings: Arc::new(PostgresBookingRepo::new(pool.clone())),
        waitlist: Arc::new(PostgresWaitlistRepo::new(pool.clone())),
        idempotency: Arc::new(PostgresIdempotencyRepo::new(pool.clone())),
    };
    assemble(
        config,
        repos,
        Arc::new(PostgresGroupRepo::new(pool.clone())),
        Arc::new(PostgresNotificationRepo::new(pool)),
    )
}

pub fn sqlite_repositories(pool: &SqlitePool) -> EngineRepositories {
    EngineRepositories {
        businesses: Arc::new(SqliteBusinessRepo::new(pool.clone())),
        resources: Arc::new(SqliteResourceRepo::new(pool.clone())),
        services: Arc::new(SqliteServiceRepo::new(pool.clone())),
        policies: Arc::new(SqlitePolicyRepo::new(pool.clone())),
        bookings: Arc::new(SqliteBookingRepo::new(pool.clone())),
        waitlist: Arc::new(SqliteWaitlistRepo::new(pool.clone())),
        idempotency: Arc::new(SqliteIdempotencyRepo::new(pool.clone())),
    }
}

pub fn sqlite_state(config: &Config, pool: SqlitePool) -> AppState {
    assemble(
        config,
        sqlite_repositories(&pool),
        Arc::new(SqliteGroupRepo::new(pool.clone())),
        Arc::new(SqliteNotificationRepo::new(pool)),
    )
}

fn assemble(
    config: &Config,
    repos: EngineRepositories,
    group_repo: Arc<dyn GroupRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
) -> AppState {
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

    let waitlist = Arc::new(WaitlistManager::new(
        repos.waitlist.clone(),
        repos.businesses.clone(),
        repos.services.clone(),
        repos.resources.clone(),
        audit.clone(),
        &config.engine,
    ));
    let engine = Arc::new(BookingEngine::new(repos.clone(), waitlist.clone(), audit.clone(), config.engine.clone()));
    let groups = Arc::new(GroupBookingAllocator::new(group_repo, audit));

    AppState {
        config: config.clone(),
        business_repo: repos.businesses,
        resource_repo: repos.resources,
        service_repo: repos.services,
        policy_repo: repos.policies,
        notification_repo,
        engine,
        waitlist,
        groups,
    }
}

async fn run_postgres_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Postgres migrations failed: {}", e)))
}

async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("SQLite migrations failed: {}", e)))
}
