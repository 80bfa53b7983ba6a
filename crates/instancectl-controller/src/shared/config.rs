use crate::features::instance_lifecycle::service::wait::{WaitConfig, MAX_WAIT};
use crate::shared::types::InstanceState;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TRANSITION_MS: u64 = 2_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid {expected}: {value}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("INSTANCECTL_POLL_INTERVAL_SECS must be greater than zero")]
    ZeroPollInterval,
    #[error("poll interval ({interval}s) must not exceed the wait timeout ({timeout}s)")]
    IntervalExceedsTimeout { interval: u64, timeout: u64 },
    #[error("{name} must be at most {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        max: u64,
        value: u64,
    },
    #[error("invalid seed instance entry: {0}")]
    InvalidSeed(String),
}

/// Instance the simulated provider starts out with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInstance {
    pub instance_id: String,
    pub state: InstanceState,
    pub instance_class: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub listen_addr: SocketAddr,
    pub wait: WaitConfig,
    /// Deadline applied to every invocation, if any.
    pub request_timeout: Option<Duration>,
    pub seed_instances: Vec<SeedInstance>,
    pub transition_delay: Duration,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("INSTANCECTL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let listen_addr =
            raw_addr
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "INSTANCECTL_ADDR",
                    expected: "socket address",
                    value: raw_addr.clone(),
                })?;

        let poll_interval = parse_u64(&lookup, "INSTANCECTL_POLL_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let wait_timeout = parse_u64(&lookup, "INSTANCECTL_WAIT_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS);
        at_most("INSTANCECTL_WAIT_TIMEOUT_SECS", wait_timeout, MAX_WAIT.as_secs())?;
        if poll_interval == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if poll_interval > wait_timeout {
            return Err(ConfigError::IntervalExceedsTimeout {
                interval: poll_interval,
                timeout: wait_timeout,
            });
        }

        let request_timeout = parse_u64(&lookup, "INSTANCECTL_REQUEST_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(|secs| at_most("INSTANCECTL_REQUEST_TIMEOUT_SECS", secs, MAX_WAIT.as_secs()))
            .transpose()?
            .map(Duration::from_secs);
        let transition_delay = parse_u64(&lookup, "INSTANCECTL_TRANSITION_MS")?
            .unwrap_or(DEFAULT_TRANSITION_MS);
        at_most(
            "INSTANCECTL_TRANSITION_MS",
            transition_delay,
            MAX_WAIT.as_millis() as u64,
        )?;

        let seed_instances = match lookup("INSTANCECTL_SEED_INSTANCES") {
            Some(raw) => parse_seed_instances(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            listen_addr,
            wait: WaitConfig::new(
                Duration::from_secs(poll_interval),
                Duration::from_secs(wait_timeout),
            ),
            request_timeout,
            seed_instances,
            transition_delay: Duration::from_millis(transition_delay),
        })
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    name,
                    expected: "non-negative integer",
                    value: raw,
                })
        }
        _ => Ok(None),
    }
}

fn at_most(name: &'static str, value: u64, max: u64) -> Result<u64, ConfigError> {
    if value > max {
        return Err(ConfigError::OutOfRange { name, max, value });
    }
    Ok(value)
}

/// Parses `id:state[:class]` entries separated by commas.
pub fn parse_seed_instances(raw: &str) -> Result<Vec<SeedInstance>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.split(':').map(str::trim);
            let instance_id = parts
                .next()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ConfigError::InvalidSeed(entry.to_string()))?;
            let state = parts
                .next()
                .ok_or_else(|| ConfigError::InvalidSeed(entry.to_string()))?
                .parse::<InstanceState>()
                .map_err(|_| ConfigError::InvalidSeed(entry.to_string()))?;
            let instance_class = parts
                .next()
                .filter(|class| !class.is_empty())
                .map(ToString::to_string);
            if parts.next().is_some() {
                return Err(ConfigError::InvalidSeed(entry.to_string()));
            }

            Ok(SeedInstance {
                instance_id: instance_id.to_string(),
                state,
                instance_class,
            })
        })
        .collect()
}
