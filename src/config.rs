use std::env;

/// Knobs the booking engine reads at runtime.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub slot_granularity_min: i64,
    pub waitlist_response_window_min: i64,
    pub waitlist_max_notifications: i32,
    pub idempotency_ttl_hours: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_granularity_min: 15,
            waitlist_response_window_min: 120,
            waitlist_max_notifications: 3,
            idempotency_ttl_hours: 24,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub log_dir: String,
    pub sweep_interval_secs: u64,
    pub engine: EngineSettings,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| panic!("{} must be a number", key)),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = EngineSettings::default();
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env_or("PORT", 3000),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 60),
            engine: EngineSettings {
                slot_granularity_min: env_or("SLOT_GRANULARITY_MIN", defaults.slot_granularity_min),
                waitlist_response_window_min: env_or("WAITLIST_RESPONSE_WINDOW_MIN", defaults.waitlist_response_window_min),
                waitlist_max_notifications: env_or("WAITLIST_MAX_NOTIFICATIONS", defaults.waitlist_max_notifications),
                idempotency_ttl_hours: env_or("IDEMPOTENCY_TTL_HOURS", defaults.idempotency_ttl_hours),
            },
        }
    }
}
