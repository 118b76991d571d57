//! Configuration management
//!
//! Settings are layered from built-in defaults, the first config file found,
//! and `ONTREG__<SECTION>__<KEY>` environment variables. The `[[olts]]` and
//! `[[profiles]]` tables form the directory used by the offline back end.

use crate::models::{OltId, OltRef, ProfileId, RegistrationProfile};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Provisioning service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// OLT connections known to the offline directory
    #[serde(default = "default_olts")]
    pub olts: Vec<OltRef>,

    /// Registration profiles known to the offline directory
    #[serde(default = "default_profiles")]
    pub profiles: Vec<RegistrationProfile>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Talk to the registration service over HTTP
    Remote,
    /// Synthetic in-process service, no OLT required
    #[default]
    Offline,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the registration service (without `/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token, empty for none
    #[serde(default)]
    pub token: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: default_base_url(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Timeout in seconds for directory reads (OLT and profile lists)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Timeout in seconds for scan and register calls; unset waits for the
    /// service however long the OLT takes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_timeout: Option<u64>,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Maximum attempts for idempotent reads
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            submit_timeout: None,
            connect_timeout: default_connect_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file path
    #[serde(default)]
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: String::new(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_olts() -> Vec<OltRef> {
    vec![OltRef {
        id: OltId::new("demo-olt"),
        name: "OLT Demo MA5600".to_string(),
        ip_address: "192.168.100.1".to_string(),
        port: 23,
        description: "Simulated chassis".to_string(),
        status: None,
    }]
}

fn default_profiles() -> Vec<RegistrationProfile> {
    vec![RegistrationProfile {
        id: ProfileId::new("vlan40"),
        name: "VLAN40".to_string(),
        olt_id: None,
        description: "Internet HGU, VLAN 40".to_string(),
        pon_type: Default::default(),
        device_type: Default::default(),
        line_profile_id: 15,
        srv_profile_id: 15,
        register_method: Default::default(),
        business_vlans: "40".to_string(),
        gemport: 1,
        user_vlan: None,
        priority: 0,
    }]
}

impl Config {
    /// Load configuration from `path`, or the first default location found
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_paths().into_iter().find(|p| p.exists()),
        };

        let mut builder = config::Config::builder();
        match &file {
            Some(file) => {
                tracing::debug!("Loading config from: {}", file.display());
                builder = builder.add_source(
                    config::File::new(&file.to_string_lossy(), config::FileFormat::Toml).required(true),
                );
            }
            None => tracing::debug!("No config file found, using defaults"),
        }

        builder
            .add_source(
                config::Environment::with_prefix("ONTREG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("ontreg.toml"),
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/ontreg/config.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("ontreg/config.toml"));
        }
        paths
    }

    pub fn bearer_token(&self) -> Option<&str> {
        Some(self.service.token.as_str()).filter(|t| !t.is_empty())
    }

    /// Effective configuration as TOML, with the token masked
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.service.token.is_empty() {
            shown.service.token = "****".to_string();
        }
        toml::to_string_pretty(&shown).context("Failed to render configuration")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            olts: default_olts(),
            profiles: default_profiles(),
        }
    }
}
