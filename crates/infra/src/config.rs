//! Process configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_ADMIN_TOKEN: &str = "dev-admin-token";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub admin_token: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub settings: ServiceSettings,
    pub workers: WorkerSettings,
}

/// Knobs the application services read at request time.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    /// TTL of cached recommendation lists.
    pub cache_ttl: Duration,
    /// Expiry of stored recommendation records.
    pub recommendation_ttl: chrono::Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            recommendation_ttl: chrono::Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub trending_interval: Duration,
    pub maintenance_interval: Duration,
    pub event_processing_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_millis(100),
            trending_interval: Duration::from_secs(3600),
            maintenance_interval: Duration::from_secs(86_400),
            event_processing_interval: Duration::from_secs(60),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            admin_token: DEFAULT_ADMIN_TOKEN.to_string(),
            use_persistent_stores: false,
            database_url: None,
            redis_url: None,
            settings: ServiceSettings::default(),
            workers: WorkerSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let admin_token = var("ADMIN_TOKEN").unwrap_or_else(|| {
            warn!("ADMIN_TOKEN not set; using the development token");
            DEFAULT_ADMIN_TOKEN.to_string()
        });

        let secs = |key: &str, default: Duration| Duration::from_secs(parse_or(key, var(key), default.as_secs()));

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            admin_token,
            use_persistent_stores: flag("USE_PERSISTENT_STORES", var("USE_PERSISTENT_STORES"), false),
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            settings: ServiceSettings {
                cache_ttl: secs("CACHE_TTL_SECS", defaults.settings.cache_ttl),
                recommendation_ttl: chrono::Duration::hours(i64::from(parse_or::<u32>(
                    "RECOMMENDATION_TTL_HOURS",
                    var("RECOMMENDATION_TTL_HOURS"),
                    24,
                ))),
            },
            workers: WorkerSettings {
                enabled: flag("WORKERS_ENABLED", var("WORKERS_ENABLED"), defaults.workers.enabled),
                poll_interval: Duration::from_millis(parse_or(
                    "WORKER_POLL_INTERVAL_MS",
                    var("WORKER_POLL_INTERVAL_MS"),
                    defaults.workers.poll_interval.as_millis() as u64,
                )),
                trending_interval: secs("TRENDING_INTERVAL_SECS", defaults.workers.trending_interval),
                maintenance_interval: secs("MAINTENANCE_INTERVAL_SECS", defaults.workers.maintenance_interval),
                event_processing_interval: secs(
                    "EVENT_PROCESSING_INTERVAL_SECS",
                    defaults.workers.event_processing_interval,
                ),
            },
        }
    }
}

fn parse_or<T: FromStr + std::fmt::Debug>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else { return default };
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value = %raw, default = ?default, "invalid configuration value; using default");
            default
        }
    }
}

fn flag(key: &str, raw: Option<String>, default: bool) -> bool {
    let Some(raw) = raw else { return default };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(key, value = %raw, default, "invalid configuration flag; using default");
            default
        }
    }
}
