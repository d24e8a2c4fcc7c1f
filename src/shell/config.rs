// Runtime configuration read from the environment.
//
// Every setting has a default that works against a local Docker daemon, so an empty
// environment runs the whole check.

use crate::modules::ephemeral_store::core::image_spec::{DYNAMODB_LOCAL_REPOSITORY, ImageSpec};
use crate::modules::ephemeral_store::readiness::policy::{Backoff, RetryPolicy};
use crate::shared::infrastructure::key_value_store::dynamodb::DynamoDbClientConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessConfig {
    pub policy: RetryPolicy,
    /// Stop retrying at the first error the store would not plausibly outgrow.
    pub transient_only: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub table_name: String,
    pub schema_path: PathBuf,
    pub image: ImageSpec,
    pub store: DynamoDbClientConfig,
    pub readiness: ReadinessConfig,
    pub bootstrap_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let string = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let image = ImageSpec::dynamodb_local(string("STORE_IMAGE_TAG", "latest"))
            .with_repository(string("STORE_IMAGE", DYNAMODB_LOCAL_REPOSITORY))
            .with_host_port(parse_optional(&lookup, "STORE_HOST_PORT")?);

        let store = DynamoDbClientConfig {
            endpoint_override: None,
            region: string("AWS_REGION", "us-west-2"),
            access_key_id: string("AWS_ACCESS_KEY_ID", "local"),
            secret_access_key: string("AWS_SECRET_ACCESS_KEY", "local"),
            operation_timeout: Duration::from_millis(parse_or(
                &lookup,
                "STORE_OPERATION_TIMEOUT_MS",
                5_000u64,
            )?),
        };

        let defaults = RetryPolicy::default();
        let (default_initial, default_multiplier, default_max) = match defaults.backoff {
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => (initial, multiplier, max),
            Backoff::Constant(delay) => (delay, 1.0, delay),
        };
        let readiness = ReadinessConfig {
            policy: RetryPolicy {
                max_attempts: parse_or(&lookup, "READINESS_MAX_ATTEMPTS", defaults.max_attempts)?,
                backoff: Backoff::Exponential {
                    initial: Duration::from_millis(parse_or(
                        &lookup,
                        "READINESS_INITIAL_BACKOFF_MS",
                        default_initial.as_millis() as u64,
                    )?),
                    multiplier: default_multiplier,
                    max: Duration::from_millis(parse_or(
                        &lookup,
                        "READINESS_MAX_BACKOFF_MS",
                        default_max.as_millis() as u64,
                    )?),
                },
            },
            transient_only: parse_or(&lookup, "READINESS_RETRY_TRANSIENT_ONLY", false)?,
        };
        if readiness.policy.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "READINESS_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        Ok(Self {
            table_name: string("TABLE_NAME", "testtable"),
            schema_path: PathBuf::from(string("SCHEMA_PATH", "schema.json")),
            image,
            store,
            readiness,
            bootstrap_timeout: Duration::from_secs(parse_or(&lookup, "BOOTSTRAP_TIMEOUT_SECS", 60u64)?),
        })
    }
}

fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}
