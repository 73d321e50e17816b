//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every section has defaults so a minimal file only sets
//! `http.secret_path`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::obfuscation::{ObfuscationError, PathGenerator, MAX_ATTEMPTS, TOKEN_ALPHABET, TOKEN_LENGTH};
use crate::storage::templates::TemplatePaths;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, timeouts).
    pub listener: ListenerConfig,

    /// Data and template file locations.
    pub paths: PathsConfig,

    /// Request surface settings.
    pub http: HttpConfig,

    /// Obfuscation path generation.
    pub obfuscation: ObfuscationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:5000").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// File locations. Relative paths resolve against `base_dir`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub users_file: PathBuf,
    pub servers_file: PathBuf,
    /// Share-URI patterns, one per protocol.
    pub uri_template: PathBuf,
    /// JSON client config skeleton.
    pub json_template: PathBuf,
    /// Base rule-engine (Clash/Mihomo) template.
    pub rule_engine_template: PathBuf,
    /// Directory of per-user rule-engine templates.
    pub custom_templates_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            users_file: PathBuf::from("users"),
            servers_file: PathBuf::from("servers"),
            uri_template: PathBuf::from("templates/v2ray-url-template.txt"),
            json_template: PathBuf::from("templates/v2ray-template.json"),
            rule_engine_template: PathBuf::from("templates/mihomo-template.yaml"),
            custom_templates_dir: PathBuf::from("templates/custom"),
        }
    }
}

impl PathsConfig {
    /// Resolve `path` against the base directory unless absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn users_path(&self) -> PathBuf {
        self.resolve(&self.users_file)
    }

    pub fn servers_path(&self) -> PathBuf {
        self.resolve(&self.servers_file)
    }

    pub fn template_paths(&self) -> TemplatePaths {
        TemplatePaths {
            rule_engine: self.resolve(&self.rule_engine_template),
            uri: self.resolve(&self.uri_template),
            json: self.resolve(&self.json_template),
            custom_dir: self.resolve(&self.custom_templates_dir),
        }
    }
}

/// Request surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Secret first path segment. Required.
    pub secret_path: String,

    /// Value of the `profile-title` response header.
    pub profile_title: String,

    /// Value of the `profile-update-interval` response header (hours).
    pub profile_update_interval: String,

    /// Extra response headers.
    pub custom_headers: Vec<CustomHeaderConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            secret_path: String::new(),
            profile_title: "sub-stub".to_string(),
            profile_update_interval: "12".to_string(),
            custom_headers: Vec::new(),
        }
    }
}

/// One extra response header, optionally limited by user agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CustomHeaderConfig {
    pub name: String,
    pub value: String,
    /// Regex matched against the start of the `User-Agent` header.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Obfuscation path generator settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObfuscationConfig {
    pub token_length: usize,
    pub alphabet: String,
    pub max_attempts: usize,
    /// Tokens never to generate. The secret path is always reserved.
    pub reserved: Vec<String>,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            token_length: TOKEN_LENGTH,
            alphabet: TOKEN_ALPHABET.to_string(),
            max_attempts: MAX_ATTEMPTS,
            reserved: Vec::new(),
        }
    }
}

impl ObfuscationConfig {
    /// Build the generator, reserving `secret_path` in addition to the
    /// configured tokens.
    pub fn generator(&self, secret_path: &str) -> Result<PathGenerator, ObfuscationError> {
        let reserved = self
            .reserved
            .iter()
            .cloned()
            .chain(Some(secret_path.to_string()).filter(|s| !s.is_empty()));
        Ok(PathGenerator::new(&self.alphabet, self.token_length)?
            .with_max_attempts(self.max_attempts)
            .with_reserved(reserved))
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
