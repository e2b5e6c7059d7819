// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and env overrides for the data-hub
//! server.
//!
//! This crate provides [`ServerConfig`] — the immutable runtime settings —
//! together with helpers for loading from TOML files, applying environment
//! overrides, and producing advisory [`ConfigWarning`]s. The value is passed
//! through component constructors; there are no process-wide singletons.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// `host` was not set and is derived from `base_url`.
    DerivedHost {
        /// The derived authority.
        host: String,
    },
    /// The signature clock-skew allowance is unusually large.
    LargeClockSkew {
        /// Allowance in seconds.
        secs: u64,
    },
    /// No accounts are configured; every session-authenticated route will
    /// deny.
    NoAccounts,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DerivedHost { host } => {
                write!(f, "host not set — derived '{host}' from base_url")
            }
            ConfigWarning::LargeClockSkew { secs } => {
                write!(f, "clock_skew_secs is large ({secs}s)")
            }
            ConfigWarning::NoAccounts => {
                write!(f, "no accounts configured: hub creation will always deny")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the data-hub server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address the server binds.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// External base URL used for invocation targets and `Location` headers.
    /// No trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host value signed requests must cover. Derived from `base_url` when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Seconds a signature's `created` timestamp may sit in the future.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,

    /// Account → named permissions, consumed by the permission bridge.
    #[serde(default)]
    pub accounts: BTreeMap<String, Vec<String>>,
}

fn default_bind() -> String {
    "127.0.0.1:9876".into()
}

fn default_base_url() -> String {
    "http://127.0.0.1:9876".into()
}

fn default_clock_skew() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_url: default_base_url(),
            host: None,
            log_level: Some("info".into()),
            clock_skew_secs: default_clock_skew(),
            accounts: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// The host authority signed requests must cover: the configured `host`,
    /// or the authority component of `base_url`.
    #[must_use]
    pub fn expected_host(&self) -> String {
        match &self.host {
            Some(h) => h.clone(),
            None => authority_of(&self.base_url),
        }
    }
}

/// Extract the authority (`host[:port]`) from a URL.
fn authority_of(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split('/').next().unwrap_or(rest).to_owned()
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Threshold above which a clock-skew allowance generates a warning.
const LARGE_SKEW_THRESHOLD: u64 = 900;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ServerConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ServerConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ServerConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`ServerConfig`].
pub fn parse_toml(content: &str) -> Result<ServerConfig, ConfigError> {
    toml::from_str::<ServerConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `HUB_BIND`
/// - `HUB_BASE_URL`
/// - `HUB_HOST`
/// - `HUB_LOG_LEVEL`
pub fn apply_env_overrides(config: &mut ServerConfig) {
    if let Ok(val) = std::env::var("HUB_BIND") {
        config.bind = val;
    }
    if let Ok(val) = std::env::var("HUB_BASE_URL") {
        config.base_url = val;
    }
    if let Ok(val) = std::env::var("HUB_HOST") {
        config.host = Some(val);
    }
    if let Ok(val) = std::env::var("HUB_LOG_LEVEL") {
        config.log_level = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (bad base_url, unknown log level) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &ServerConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if config.bind.is_empty() {
        errors.push("bind must not be empty".into());
    }

    if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
        errors.push(format!("base_url '{}' must be http(s)", config.base_url));
    }
    if config.base_url.ends_with('/') {
        errors.push("base_url must not end with '/'".into());
    }

    if let Some(ref level) = config.log_level {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!("invalid log_level '{level}'"));
        }
    }

    if config.host.is_none() {
        warnings.push(ConfigWarning::DerivedHost {
            host: config.expected_host(),
        });
    }

    if config.clock_skew_secs > LARGE_SKEW_THRESHOLD {
        warnings.push(ConfigWarning::LargeClockSkew {
            secs: config.clock_skew_secs,
        });
    }

    if config.accounts.is_empty() {
        warnings.push(ConfigWarning::NoAccounts);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
