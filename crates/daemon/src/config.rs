// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: TOML file plus `TY_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use ty_backend::KubernetesConfig;
use ty_engine::{CollectorConfig, SupervisorConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Address the HTTP surface binds to
    pub listen_addr: String,
    /// Durable state directory; defaults under the user data dir
    pub state_dir: Option<PathBuf>,
    /// Externally reachable base URL embedded in worker callback addresses.
    /// Defaults to `http://<listen_addr>`, which only works for local
    /// workers; cluster jobs need a routable address here.
    pub callback_base: Option<String>,
    pub local: LocalSection,
    pub kubernetes: Option<KubernetesSection>,
    pub collector: CollectorSection,
    pub monitor: MonitorSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalSection {
    pub enabled: bool,
}

impl Default for LocalSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KubernetesSection {
    pub namespace: String,
    pub image: String,
    pub poll_interval_ms: u64,
}

impl Default for KubernetesSection {
    fn default() -> Self {
        let defaults = KubernetesConfig::default();
        Self {
            namespace: defaults.namespace,
            image: defaults.default_image,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
        }
    }
}

impl KubernetesSection {
    pub fn to_backend_config(&self) -> KubernetesConfig {
        KubernetesConfig {
            namespace: self.namespace.clone(),
            default_image: self.image.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorSection {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub forward_attempts: u32,
}

impl Default for CollectorSection {
    fn default() -> Self {
        let defaults = CollectorConfig::default();
        Self {
            batch_size: defaults.batch_size,
            flush_interval_ms: defaults.flush_interval.as_millis() as u64,
            forward_attempts: defaults.forward_attempts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let defaults = SupervisorConfig::default();
        Self {
            attempts: defaults.monitor_attempts,
            backoff_ms: defaults.monitor_backoff.as_millis() as u64,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070".to_string(),
            state_dir: None,
            callback_base: None,
            local: LocalSection::default(),
            kubernetes: None,
            collector: CollectorSection::default(),
            monitor: MonitorSection::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from a TOML file (when given), then apply environment
    /// overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
                toml::from_str(&text)
                    .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("TY_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("TY_STATE_DIR") {
            self.state_dir = Some(PathBuf::from(dir));
        }
        if let Ok(base) = std::env::var("TY_CALLBACK_BASE") {
            self.callback_base = Some(base);
        }
        if let Ok(namespace) = std::env::var("TY_K8S_NAMESPACE") {
            let section = self.kubernetes.get_or_insert_with(KubernetesSection::default);
            section.namespace = namespace;
        }
        if let Ok(image) = std::env::var("TY_K8S_IMAGE") {
            let section = self.kubernetes.get_or_insert_with(KubernetesSection::default);
            section.image = image;
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("trainyard")
        })
    }

    pub fn callback_base(&self) -> String {
        self.callback_base
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen_addr))
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            monitor_attempts: self.monitor.attempts,
            monitor_backoff: Duration::from_millis(self.monitor.backoff_ms),
            collector: CollectorConfig {
                batch_size: self.collector.batch_size,
                flush_interval: Duration::from_millis(self.collector.flush_interval_ms),
                forward_attempts: self.collector.forward_attempts,
            },
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
