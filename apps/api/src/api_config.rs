use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use auditor_core::AppError;
use tracing_subscriber::EnvFilter;

const MIN_WORKER_SHARED_SECRET_LENGTH: usize = 16;
const MAX_LIVENESS_WINDOW_SECONDS: u64 = 7 * 24 * 60 * 60;
const MAX_REAPER_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

/// Queue transport selected for audit tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// Leased rows in the shared PostgreSQL database.
    Postgres,
    /// Redis lists moved atomically by server-side scripts.
    Redis,
    /// Process-local queue drained by an embedded worker.
    Memory,
}

impl QueueBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::Validation(format!(
                "invalid QUEUE_BACKEND '{other}', expected postgres, redis or memory"
            ))),
        }
    }

    /// Returns stable backend label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

/// Runtime configuration of the orchestrator process.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: Option<String>,
    pub worker_shared_secret: String,
    pub queue_backend: QueueBackend,
    pub queue_key_prefix: String,
    pub redis_url: Option<String>,
    pub events_enabled: bool,
    pub liveness_window: Duration,
    pub reaper_interval: Duration,
    pub instance_id: String,
    pub inventory_path: Option<String>,
}

impl ApiConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    fn from_lookup<F>(migrate_only: bool, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required_non_empty(&lookup, "DATABASE_URL")?;
        let api_host = optional_non_empty(&lookup, "API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or_default::<u16, _>(&lookup, "API_PORT", 3001)?;
        let frontend_url = optional_non_empty(&lookup, "FRONTEND_URL")
            .map(|value| {
                url::Url::parse(value.as_str())
                    .map(|_| value.trim_end_matches('/').to_owned())
                    .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))
            })
            .transpose()?;

        let worker_shared_secret = required_non_empty(&lookup, "WORKER_SHARED_SECRET")?;
        if worker_shared_secret.len() < MIN_WORKER_SHARED_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "WORKER_SHARED_SECRET must be at least {MIN_WORKER_SHARED_SECRET_LENGTH} characters"
            )));
        }

        let queue_backend = optional_non_empty(&lookup, "QUEUE_BACKEND")
            .map(|value| QueueBackend::parse(value.as_str()))
            .transpose()?
            .unwrap_or(QueueBackend::Postgres);
        let queue_key_prefix = optional_non_empty(&lookup, "AUDIT_QUEUE_KEY_PREFIX")
            .unwrap_or_else(|| "auditor:queue".to_owned());
        let redis_url = optional_non_empty(&lookup, "REDIS_URL");
        let events_enabled = parse_bool(&lookup, "AUDIT_EVENTS_ENABLED", false)?;

        if queue_backend == QueueBackend::Redis && redis_url.is_none() {
            return Err(AppError::Validation(
                "REDIS_URL is required when QUEUE_BACKEND=redis".to_owned(),
            ));
        }

        if events_enabled && redis_url.is_none() {
            return Err(AppError::Validation(
                "REDIS_URL is required when AUDIT_EVENTS_ENABLED=true".to_owned(),
            ));
        }

        let liveness_window = bounded_seconds(
            &lookup,
            "JOB_LIVENESS_WINDOW_SECONDS",
            300,
            MAX_LIVENESS_WINDOW_SECONDS,
        )?;
        let reaper_interval =
            bounded_seconds(&lookup, "REAPER_INTERVAL_SECONDS", 30, MAX_REAPER_INTERVAL_SECONDS)?;
        let instance_id = optional_non_empty(&lookup, "API_INSTANCE_ID")
            .unwrap_or_else(|| format!("api-{}", std::process::id()));
        let inventory_path = optional_non_empty(&lookup, "AUDIT_INVENTORY_PATH");

        Ok(Self {
            migrate_only,
            database_url,
            api_host,
            api_port,
            frontend_url,
            worker_shared_secret,
            queue_backend,
            queue_key_prefix,
            redis_url,
            events_enabled,
            liveness_window,
            reaper_interval,
            instance_id,
            inventory_path,
        })
    }

    /// Returns the socket address the HTTP listener binds to.
    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let ip = IpAddr::from_str(self.api_host.as_str())
            .map_err(|error| AppError::Validation(format!("invalid API_HOST: {error}")))?;
        Ok(SocketAddr::from((ip, self.api_port)))
    }

    /// Whether health checks must treat Redis as a hard dependency.
    #[must_use]
    pub fn redis_required(&self) -> bool {
        self.queue_backend == QueueBackend::Redis || self.events_enabled
    }

    /// Reaper lease duration in whole seconds.
    ///
    /// One second shorter than the interval so the holder's next tick finds its own
    /// lease expired.
    #[must_use]
    pub fn reaper_lease_seconds(&self) -> u32 {
        u32::try_from(self.reaper_interval.as_secs().saturating_sub(1))
            .unwrap_or(u32::MAX)
            .max(1)
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty<F>(lookup: &F, name: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_non_empty(lookup, name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn optional_non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_or_default<T, F>(lookup: &F, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match optional_non_empty(lookup, name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn bounded_seconds<F>(lookup: &F, name: &str, default: u64, max: u64) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let seconds = parse_or_default::<u64, _>(lookup, name, default)?;
    if seconds == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    if seconds > max {
        return Err(AppError::Validation(format!(
            "{name} must be at most {max} seconds"
        )));
    }

    Ok(Duration::from_secs(seconds))
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional_non_empty(lookup, name) {
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(AppError::Validation(format!(
                "invalid {name} value '{value}', expected true or false"
            ))),
        },
        None => Ok(default),
    }
}
