use std::env;
use std::str::FromStr;
use std::time::Duration;

use auditor_application::WorkerRuntimeConfig;
use auditor_core::{AppError, AppResult};

/// Queue transports a standalone worker can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerQueueBackend {
    /// Leased rows in the shared PostgreSQL database.
    Postgres,
    /// Redis reliable queue.
    Redis,
}

impl WorkerQueueBackend {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" => Err(AppError::Validation(
                "QUEUE_BACKEND=memory is served by the API's embedded worker".to_owned(),
            )),
            other => Err(AppError::Validation(format!(
                "invalid QUEUE_BACKEND '{other}', expected postgres or redis"
            ))),
        }
    }

    /// Returns stable backend label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub api_base_url: String,
    pub worker_shared_secret: String,
    pub worker_id: String,
    pub queue_backend: WorkerQueueBackend,
    pub queue_key_prefix: String,
    pub redis_url: Option<String>,
    pub poll_interval: Duration,
    pub visibility_timeout: Duration,
    pub check_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub inventory_path: Option<String>,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required_env(&lookup, "DATABASE_URL")?;
        let api_base_url = optional_env(&lookup, "WORKER_API_BASE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3001".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let worker_shared_secret = required_env(&lookup, "WORKER_SHARED_SECRET")?;
        let worker_id = optional_env(&lookup, "WORKER_ID").unwrap_or_else(|| {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!(
                "worker-{}-{}",
                std::process::id(),
                suffix.get(..8).unwrap_or(suffix.as_str())
            )
        });
        let queue_backend = optional_env(&lookup, "QUEUE_BACKEND")
            .map(|value| WorkerQueueBackend::parse(value.as_str()))
            .transpose()?
            .unwrap_or(WorkerQueueBackend::Postgres);
        let queue_key_prefix = optional_env(&lookup, "AUDIT_QUEUE_KEY_PREFIX")
            .unwrap_or_else(|| "auditor:queue".to_owned());
        let redis_url = optional_env(&lookup, "REDIS_URL");

        if queue_backend == WorkerQueueBackend::Redis && redis_url.is_none() {
            return Err(AppError::Validation(
                "REDIS_URL is required when QUEUE_BACKEND=redis".to_owned(),
            ));
        }

        let poll_interval =
            Duration::from_millis(parse_positive_env(&lookup, "WORKER_POLL_INTERVAL_MS", 1500)?);
        let visibility_timeout = Duration::from_secs(parse_positive_env(
            &lookup,
            "WORKER_VISIBILITY_TIMEOUT_SECONDS",
            120,
        )?);
        let check_timeout =
            Duration::from_secs(parse_positive_env(&lookup, "CHECK_TIMEOUT_SECONDS", 60)?);
        let heartbeat_interval = Duration::from_secs(parse_positive_env(
            &lookup,
            "WORKER_HEARTBEAT_INTERVAL_SECONDS",
            15,
        )?);
        let inventory_path = optional_env(&lookup, "AUDIT_INVENTORY_PATH");

        let config = Self {
            database_url,
            api_base_url,
            worker_shared_secret,
            worker_id,
            queue_backend,
            queue_key_prefix,
            redis_url,
            poll_interval,
            visibility_timeout,
            check_timeout,
            heartbeat_interval,
            inventory_path,
        };
        config.runtime_config().validate()?;

        Ok(config)
    }

    /// Runtime tuning derived from this configuration.
    #[must_use]
    pub fn runtime_config(&self) -> WorkerRuntimeConfig {
        WorkerRuntimeConfig {
            worker_id: self.worker_id.clone(),
            visibility_timeout: self.visibility_timeout,
            poll_wait: self.poll_interval,
            check_timeout: self.check_timeout,
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

fn required_env<F>(lookup: &F, name: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional_env(lookup, name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn optional_env<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_positive_env<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = match optional_env(lookup, name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    if value == T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use auditor_core::AppError;

    use super::{WorkerConfig, WorkerQueueBackend};

    const BASE: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://auditor@localhost/auditor"),
        ("WORKER_SHARED_SECRET", "0123456789abcdef"),
    ];

    fn load(pairs: &[(&str, &str)]) -> Result<WorkerConfig, AppError> {
        let values = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect::<HashMap<_, _>>();
        WorkerConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = load(&BASE).unwrap_or_else(|error| panic!("config should load: {error}"));

        assert_eq!(config.api_base_url, "http://127.0.0.1:3001");
        assert_eq!(config.queue_backend, WorkerQueueBackend::Postgres);
        assert_eq!(config.poll_interval, Duration::from_millis(1500));
        assert_eq!(config.visibility_timeout, Duration::from_secs(120));
        assert_eq!(config.check_timeout, Duration::from_secs(60));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert!(config.worker_id.starts_with("worker-"));
        assert_eq!(config.runtime_config().poll_wait, config.poll_interval);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("WORKER_API_BASE_URL", "https://auditor.internal/"),
            ("WORKER_ID", " scanner-a "),
            ("QUEUE_BACKEND", "redis"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("WORKER_HEARTBEAT_INTERVAL_SECONDS", "5"),
        ]);
        let config = load(&pairs).unwrap_or_else(|error| panic!("config should load: {error}"));

        assert_eq!(config.api_base_url, "https://auditor.internal");
        assert_eq!(config.worker_id, "scanner-a");
        assert_eq!(config.queue_backend, WorkerQueueBackend::Redis);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
    }

    #[test]
    fn invalid_values_are_rejected_at_startup() {
        for (name, value) in [
            ("WORKER_POLL_INTERVAL_MS", "0"),
            ("CHECK_TIMEOUT_SECONDS", "-1"),
            ("WORKER_VISIBILITY_TIMEOUT_SECONDS", "10"),
            ("QUEUE_BACKEND", "memory"),
            ("QUEUE_BACKEND", "redis"),
        ] {
            let mut pairs = BASE.to_vec();
            pairs.push((name, value));
            assert!(
                matches!(load(&pairs), Err(AppError::Validation(_))),
                "{name}={value} should be rejected"
            );
        }

        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://localhost/auditor")]),
            Err(AppError::Validation(_))
        ));
    }
}
