//! Service and runtime configuration.
//!
//! [`ServiceConfig`] is the YAML-backed wiring configuration (service
//! identity, gateway location, auth defaults); every field has a default so a
//! missing file or empty document still yields a usable config.
//! [`RuntimeConfig`] tunes the coroutine runtime from environment variables.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::registry::RouteStyle;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Identity and exposure of this service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    /// Base path under which operations are exposed.
    pub path: String,
    pub style: RouteStyle,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            version: "v1".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            path: "/services".to_string(),
            style: RouteStyle::default(),
        }
    }
}

/// Location of the gateway used for remote dispatch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout_ms: u64,
}

impl GatewaySection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3500,
            path: "/services".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// Authentication defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Scope required by operations that do not declare their own.
    pub scope: Option<String>,
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub gateway: GatewaySection,
    pub auth: AuthSection,
}

impl ServiceConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        info!(path = %path.display(), "loaded service config");
        Self::from_yaml(&raw)
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for handler coroutines in bytes. `OPD_STACK_SIZE` accepts
    /// decimal or `0x` hex; default 16 KiB.
    pub stack_size: usize,
}

pub const DEFAULT_STACK_SIZE: usize = 0x4000;

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let stack_size = env::var("OPD_STACK_SIZE")
            .ok()
            .and_then(|val| {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).ok()
                } else {
                    val.parse().ok()
                }
            })
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }

    /// Apply this configuration to the coroutine runtime.
    pub fn install(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}
