// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::engine_core::constants::{config as env_names, limits, pool};
use crate::engine_core::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow several listeners on the same port (SO_REUSEPORT).
    pub reuse_port: bool,
    pub max_message_size: usize,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env_names::DEFAULT_HOST.to_string(),
            port: env_names::DEFAULT_PORT,
            reuse_port: false,
            max_message_size: limits::MAX_MESSAGE_SIZE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on connections checked out at the same time.
    pub max_open: usize,
    /// Idle connections kept for reuse; extras are closed on release.
    pub max_idle: usize,
    /// `None` waits forever for a free slot.
    pub acquire_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    /// `None` waits forever for a reply.
    pub request_timeout: Option<Duration>,
    pub max_message_size: usize,
}

impl PoolConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn max_open(mut self, max_open: usize) -> Self {
        self.max_open = max_open;
        self
    }

    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: env_names::DEFAULT_HOST.to_string(),
            port: env_names::DEFAULT_PORT,
            max_open: pool::DEFAULT_MAX_OPEN,
            max_idle: pool::DEFAULT_MAX_IDLE,
            acquire_timeout: Some(Duration::from_millis(pool::DEFAULT_ACQUIRE_TIMEOUT_MS)),
            connect_timeout: Duration::from_millis(pool::DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Some(Duration::from_millis(pool::DEFAULT_REQUEST_TIMEOUT_MS)),
            max_message_size: limits::MAX_MESSAGE_SIZE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup(env_names::ENV_HOST) {
            config.server.host = host.clone();
            config.pool.host = host;
        }
        if let Some(port) = parse_var::<u16, _>(&lookup, env_names::ENV_PORT)? {
            config.server.port = port;
            config.pool.port = port;
        }
        if let Some(flag) = lookup(env_names::ENV_REUSE_PORT) {
            config.server.reuse_port = flag.to_lowercase() == "true" || flag == "1";
        }
        if let Some(max_open) = parse_var(&lookup, env_names::ENV_POOL_MAX_OPEN)? {
            config.pool.max_open = max_open;
        }
        if let Some(max_idle) = parse_var(&lookup, env_names::ENV_POOL_MAX_IDLE)? {
            config.pool.max_idle = max_idle;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, env_names::ENV_ACQUIRE_TIMEOUT_MS)? {
            config.pool.acquire_timeout = millis_or_forever(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, env_names::ENV_REQUEST_TIMEOUT_MS)? {
            config.pool.request_timeout = millis_or_forever(ms);
        }
        if let Some(level) = lookup(env_names::ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(format) = lookup(env_names::ENV_LOG_FORMAT) {
            config.log_format = format;
        }

        if config.pool.max_open == 0 {
            return Err(ConfigError::InvalidValue {
                var: env_names::ENV_POOL_MAX_OPEN,
                value: "0".to_string(),
            });
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pool: PoolConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

// 0 means no limit
fn millis_or_forever(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
