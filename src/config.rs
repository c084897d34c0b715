//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - stratalog.toml (default configuration)
//! - stratalog.local.toml (git-ignored local overrides)
//! - Environment variables (STRATALOG_* prefix)
//!
//! Every key has a default, so all three sources are optional.
//!
//! ## Example
//!
//! ```toml
//! # stratalog.toml
//! [evaluation]
//! max_iterations = 10000
//! trace_relations = false
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! STRATALOG_EVALUATION__MAX_ITERATIONS=500
//! STRATALOG_LOGGING__LEVEL=trace
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fixpoint evaluation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Semi-naive rounds allowed per stratum (0 = unlimited)
    #[serde(default)]
    pub max_iterations: usize,

    /// Hand full relation tables to the observer after each rule evaluation
    #[serde(default)]
    pub trace_relations: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. stratalog.toml (base configuration)
    /// 2. stratalog.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (STRATALOG_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("stratalog.toml"))
            .merge(Toml::file("stratalog.local.toml"))
            .merge(Env::prefixed("STRATALOG_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("STRATALOG_").split("__"))
            .extract()
    }
}

impl LoggingConfig {
    /// Whether log output should be JSON lines
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}
