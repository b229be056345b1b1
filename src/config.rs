// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operator configuration.
//!
//! Read from an optional TOML file, then overridden from the environment:
//! - `GITIFOLD_CONFIG`: path of the TOML file
//! - `GITIFOLD_LOG_LEVEL`: log level or filter directive
//! - `GITIFOLD_LOG_FORMAT`: `pretty` or `json`
//! - `GITIFOLD_STORAGE_CLASS`: storage class for every volume claim

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::k8s::profiles::quantity_bytes;

pub const ENV_CONFIG: &str = "GITIFOLD_CONFIG";
pub const ENV_LOG_LEVEL: &str = "GITIFOLD_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "GITIFOLD_LOG_FORMAT";
pub const ENV_STORAGE_CLASS: &str = "GITIFOLD_STORAGE_CLASS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!("unknown log format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level or `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/// Container image per component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub postgres: String,
    pub postgres_exporter: String,
    pub keydb: String,
    pub gitea: String,
    pub drone: String,
    pub drone_runner: String,
    pub registry: String,
    pub clair: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            postgres: "postgres:12.2-alpine".to_string(),
            postgres_exporter: "wrouesnel/postgres_exporter:v0.8.0".to_string(),
            keydb: "eqalpha/keydb:latest".to_string(),
            gitea: "gitea/gitea:1.11.3".to_string(),
            drone: "drone/drone:1.6.5".to_string(),
            drone_runner: "drone/drone-runner-kube:1.0.0-beta.1".to_string(),
            registry: "registry:2.7.1".to_string(),
            clair: "coreos/clair:v2.12".to_string(),
        }
    }
}

impl ImageConfig {
    fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("postgres", self.postgres.as_str()),
            ("postgres_exporter", self.postgres_exporter.as_str()),
            ("keydb", self.keydb.as_str()),
            ("gitea", self.gitea.as_str()),
            ("drone", self.drone.as_str()),
            ("drone_runner", self.drone_runner.as_str()),
            ("registry", self.registry.as_str()),
            ("clair", self.clair.as_str()),
        ]
    }
}

/// Volume sizes and storage class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub postgres_size: String,
    pub gitea_size: String,
    pub registry_size: String,
    /// Cluster default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            postgres_size: "2Gi".to_string(),
            gitea_size: "5Gi".to_string(),
            registry_size: "1Gi".to_string(),
            storage_class: None,
        }
    }
}

/// Complete operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub logging: LoggingConfig,
    pub images: ImageConfig,
    pub storage: StorageConfig,
}

impl OperatorConfig {
    /// Load from `path`, or from `GITIFOLD_CONFIG`, or defaults; then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Apply overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).filter(|v| !v.is_empty()) {
            self.logging.format = format.parse()?;
        }
        if let Some(class) = lookup(ENV_STORAGE_CLASS) {
            self.storage.storage_class = Some(class).filter(|c| !c.is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        for (component, image) in self.images.entries() {
            if image.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("images.{} must not be empty", component)));
            }
        }
        let sizes = [
            ("postgres_size", &self.storage.postgres_size),
            ("gitea_size", &self.storage.gitea_size),
            ("registry_size", &self.storage.registry_size),
        ];
        for (field, size) in sizes {
            match quantity_bytes(size) {
                Some(bytes) if bytes > 0 => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "storage.{} '{}' is not a valid size",
                        field, size
                    )))
                }
            }
        }
        Ok(())
    }

    /// TOML rendering, as written back by `config show`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
