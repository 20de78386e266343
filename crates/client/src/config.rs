// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration (env vars in milliseconds)

use ctlwire_adapters::StreamConnector;
use std::time::Duration;
use thiserror::Error;

pub const ENV_TIMEOUT_IPC_MS: &str = "CTLWIRE_TIMEOUT_IPC_MS";
pub const ENV_TIMEOUT_CONNECT_MS: &str = "CTLWIRE_TIMEOUT_CONNECT_MS";
pub const ENV_POLL_MS: &str = "CTLWIRE_POLL_MS";
pub const ENV_POOL_CAPACITY: &str = "CTLWIRE_POOL_CAPACITY";

const MIN_POLL: Duration = Duration::from_millis(1);
const MAX_POLL: Duration = Duration::from_secs(1);

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: u128,
        min: u128,
        max: u128,
    },

    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Timeouts and limits shared by sessions and pools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    io_timeout: Duration,
    connect_timeout: Duration,
    poll_interval: Duration,
    global_capacity: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            global_capacity: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by any `CTLWIRE_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = env_u64(ENV_TIMEOUT_IPC_MS)? {
            config = config.with_io_timeout(Duration::from_millis(ms))?;
        }
        if let Some(ms) = env_u64(ENV_TIMEOUT_CONNECT_MS)? {
            config = config.with_connect_timeout(Duration::from_millis(ms))?;
        }
        if let Some(ms) = env_u64(ENV_POLL_MS)? {
            config = config.with_poll_interval(Duration::from_millis(ms))?;
        }
        if let Some(capacity) = env_u64(ENV_POOL_CAPACITY)? {
            let capacity = usize::try_from(capacity).map_err(|_| ConfigError::Invalid {
                name: ENV_POOL_CAPACITY,
                value: capacity.to_string(),
            })?;
            config = config.with_global_capacity(Some(capacity))?;
        }
        Ok(config)
    }

    /// [`ClientConfig::from_env`], falling back to defaults with a warning
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring invalid client config");
            Self::default()
        })
    }

    /// Timeout applied to new sessions' invokes
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// How often a blocked receive checks for cancellation
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Capacity of the global pool; `None` is unbounded
    pub fn global_capacity(&self) -> Option<usize> {
        self.global_capacity
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.io_timeout = non_zero("io_timeout", timeout)?;
        Ok(self)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.connect_timeout = non_zero("connect_timeout", timeout)?;
        Ok(self)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval < MIN_POLL || interval > MAX_POLL {
            return Err(ConfigError::OutOfRange {
                name: "poll_interval",
                value: interval.as_millis(),
                min: MIN_POLL.as_millis(),
                max: MAX_POLL.as_millis(),
            });
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn with_global_capacity(mut self, capacity: Option<usize>) -> Result<Self, ConfigError> {
        if capacity == Some(0) {
            return Err(ConfigError::OutOfRange {
                name: "global_capacity",
                value: 0,
                min: 1,
                max: usize::MAX as u128,
            });
        }
        self.global_capacity = capacity;
        Ok(self)
    }

    /// Socket connector using these timeouts
    pub fn connector(&self) -> StreamConnector {
        StreamConnector::new(self.connect_timeout, self.poll_interval)
    }
}

fn non_zero(name: &'static str, timeout: Duration) -> Result<Duration, ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::OutOfRange {
            name,
            value: 0,
            min: 1,
            max: u64::MAX as u128,
        });
    }
    Ok(timeout)
}

fn env_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(text) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name: var, value: text }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
