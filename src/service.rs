//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! get(link, format token)
//!     → UserRepository::find_by_link_prefix
//!     → Format::parse (alias table, case-insensitive)
//!     → ServerRepository::load
//!     → access::visible_servers
//!     → TemplateStore (custom rule-engine template or base)
//!     → builder for the format
//!     → RenderedConfig { body, content_type }
//! ```
//!
//! # Design Decisions
//! - One entry point for every caller (HTTP handler and CLI)
//! - Every failure leaves as a named [`ServiceError`] variant
//! - Metrics are recorded here so both callers are counted the same way

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::access::visible_servers;
use crate::builders::{
    uri::encode_base64, BuildError, ConfigBuilder, JsonBuilder, RuleEngineBuilder, TemplateError,
    UriBuilder,
};
use crate::config::AppConfig;
use crate::model::{Server, UserInfo};
use crate::obfuscation::{ObfuscationError, PathGenerator};
use crate::observability::metrics;
use crate::storage::templates::{TemplateFallback, TemplatePaths};
use crate::storage::{
    CacheSet, RepositoryError, ServerRepository, TemplateStore, UserRepository, UserTable,
};

/// Output format of a rendered configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Clash/Mihomo YAML.
    RuleEngine,
    /// Newline-separated share URIs.
    Uri,
    /// Share URIs, base64-encoded as a whole.
    UriBase64,
    /// JSON array of client config blocks.
    Json,
}

/// Recognized format tokens. Matching is case-insensitive.
pub const FORMAT_ALIASES: &[(&str, Format)] = &[
    ("clash", Format::RuleEngine),
    ("mh", Format::RuleEngine),
    ("mihomo", Format::RuleEngine),
    ("type3", Format::RuleEngine),
    ("v2ray", Format::Uri),
    ("v2", Format::Uri),
    ("sub", Format::Uri),
    ("v2ray-b64", Format::UriBase64),
    ("b64", Format::UriBase64),
    ("base64", Format::UriBase64),
    ("json", Format::Json),
];

impl Format {
    /// Resolve a request token. The empty token selects [`Format::Json`].
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Some(Self::Json);
        }
        FORMAT_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(token))
            .map(|(_, format)| *format)
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::RuleEngine => "application/yaml",
            Self::Uri | Self::UriBase64 => "text/plain; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleEngine => "rule-engine",
            Self::Uri => "uri",
            Self::UriBase64 => "uri-base64",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ServiceError::UnknownFormat(s.to_string()))
    }
}

/// Request-level failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no user matches link segment '{0}'")]
    NotFound(String),

    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("user has no access to any servers")]
    NoAccessibleServers,

    #[error(transparent)]
    ExhaustedSpace(ObfuscationError),

    /// Also covers a base template that is missing or invalid; custom
    /// templates fall back to the base one instead of failing.
    #[error("build failed: {reason}")]
    BuildFailed {
        reason: String,
        #[source]
        source: Option<TemplateError>,
    },

    #[error("servers unavailable: {0}")]
    ServersUnavailable(String),
}

impl ServiceError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::UnknownFormat(_) => "unknown_format",
            Self::NoAccessibleServers => "no_accessible_servers",
            Self::ExhaustedSpace(_) => "exhausted_space",
            Self::BuildFailed { .. } => "build_failed",
            Self::ServersUnavailable(_) => "servers_unavailable",
        }
    }
}

impl From<BuildError> for ServiceError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::NoServers => Self::NoAccessibleServers,
            BuildError::Obfuscation(e) => Self::ExhaustedSpace(e),
            BuildError::Failed(reason) => Self::BuildFailed {
                reason,
                source: None,
            },
        }
    }
}

impl From<TemplateError> for ServiceError {
    fn from(err: TemplateError) -> Self {
        Self::BuildFailed {
            reason: err.to_string(),
            source: Some(err),
        }
    }
}

/// A successfully rendered configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub body: String,
    pub content_type: &'static str,
    pub format: Format,
    /// Set when the user's custom template was replaced by the base one.
    pub template_fallback: Option<TemplateFallback>,
}

/// Single entry point for rendering user configurations.
#[derive(Debug, Clone)]
pub struct ConfigService {
    users: UserRepository,
    servers: ServerRepository,
    templates: TemplateStore,
    rule_engine: RuleEngineBuilder,
    uri: UriBuilder,
    json: JsonBuilder,
    caches: Arc<CacheSet>,
}

/// Files the service reads.
#[derive(Debug, Clone)]
pub struct ServicePaths {
    pub users: std::path::PathBuf,
    pub servers: std::path::PathBuf,
    pub templates: TemplatePaths,
}

impl ConfigService {
    pub fn new(paths: ServicePaths, generator: PathGenerator, caches: Arc<CacheSet>) -> Self {
        Self {
            users: UserRepository::new(paths.users, Arc::clone(&caches.users)),
            servers: ServerRepository::new(paths.servers, Arc::clone(&caches.servers)),
            templates: TemplateStore::new(paths.templates, Arc::clone(&caches)),
            rule_engine: RuleEngineBuilder,
            uri: UriBuilder::new(generator.clone()),
            json: JsonBuilder::new(generator),
            caches,
        }
    }

    /// Wire a service from validated configuration.
    pub fn from_config(config: &AppConfig, caches: Arc<CacheSet>) -> Result<Self, ObfuscationError> {
        let generator = config.obfuscation.generator(&config.http.secret_path)?;
        let paths = ServicePaths {
            users: config.paths.users_path(),
            servers: config.paths.servers_path(),
            templates: config.paths.template_paths(),
        };
        Ok(Self::new(paths, generator, caches))
    }

    pub fn caches(&self) -> &Arc<CacheSet> {
        &self.caches
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Current user table.
    pub fn users(&self) -> Result<Arc<UserTable>, ServiceError> {
        self.users.load().map_err(storage_failure)
    }

    /// Current server registry in file order.
    pub fn servers(&self) -> Result<Arc<Vec<Server>>, ServiceError> {
        self.servers.load().map_err(storage_failure)
    }

    pub fn find_user(&self, link_segment: &str) -> Result<UserInfo, ServiceError> {
        self.users
            .find_by_link_prefix(link_segment)
            .map_err(storage_failure)
    }

    /// The user owning `link_segment` and the servers they may use.
    pub fn servers_for(&self, link_segment: &str) -> Result<(UserInfo, Vec<Server>), ServiceError> {
        let user = self.find_user(link_segment)?;
        let visible = self.visible_for(&user)?;
        Ok((user, visible))
    }

    fn visible_for(&self, user: &UserInfo) -> Result<Vec<Server>, ServiceError> {
        let servers = self.servers()?;
        if servers.is_empty() {
            return Err(ServiceError::ServersUnavailable(
                "server registry is empty".into(),
            ));
        }
        Ok(visible_servers(user, &servers))
    }

    /// Render the configuration for `link_segment` in the format named by
    /// `format_token`.
    ///
    /// The user is resolved before the format, so an unknown user is
    /// `NotFound` whatever the token.
    pub fn get(&self, link_segment: &str, format_token: &str) -> Result<RenderedConfig, ServiceError> {
        let format = Format::parse(format_token);

        let result = self.get_format(link_segment, format_token, format);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::record_request(format.map_or("unknown", |f| f.as_str()), outcome);
        result
    }

    fn get_format(
        &self,
        link_segment: &str,
        format_token: &str,
        format: Option<Format>,
    ) -> Result<RenderedConfig, ServiceError> {
        let user = self.find_user(link_segment)?;
        let format = format.ok_or_else(|| ServiceError::UnknownFormat(format_token.to_string()))?;
        let servers = self.visible_for(&user)?;

        tracing::info!(
            user = %user.label,
            id = %user.identity_hint(),
            format = %format,
            groups = %crate::model::groups_summary(&user.groups, "-"),
            visible = servers.len(),
            "Generating config"
        );

        let start = Instant::now();
        let rendered = self.render(&user, &servers, format);
        metrics::record_build_duration(format.as_str(), start);
        rendered
    }

    /// Build `format` for `user` over an already-filtered server list.
    pub fn render(
        &self,
        user: &UserInfo,
        servers: &[Server],
        format: Format,
    ) -> Result<RenderedConfig, ServiceError> {
        let mut template_fallback = None;
        let body = match format {
            Format::RuleEngine => {
                let (template, fallback) = self
                    .templates
                    .rule_engine_for(user.custom_template.as_deref())?;
                template_fallback = fallback;
                self.rule_engine.build(user, servers, &template)?
            }
            Format::Uri => self.uri.build(user, servers, &*self.templates.uri()?)?,
            Format::UriBase64 => {
                encode_base64(&self.uri.build(user, servers, &*self.templates.uri()?)?)
            }
            Format::Json => self.json.build(user, servers, &*self.templates.json()?)?,
        };

        Ok(RenderedConfig {
            body,
            content_type: format.content_type(),
            format,
            template_fallback,
        })
    }
}

fn storage_failure(err: RepositoryError) -> ServiceError {
    match err {
        RepositoryError::UserNotFound(segment) => ServiceError::NotFound(segment),
        RepositoryError::NotFound(path) => {
            ServiceError::ServersUnavailable(format!("{} is missing", path.display()))
        }
        RepositoryError::Io(e) => ServiceError::ServersUnavailable(e.to_string()),
    }
}
