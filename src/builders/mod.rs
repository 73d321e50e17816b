//! Client configuration builders.
//!
//! # Data Flow
//! ```text
//! (user, visible servers, validated template)
//!     → rule_engine.rs  → YAML document (Clash/Mihomo)
//!     → uri.rs          → one share URI per server and protocol
//!     → json.rs         → JSON array of client config blocks
//! ```
//!
//! # Design Decisions
//! - Templates are parsed and validated once when loaded; builders only see
//!   typed templates and never inspect raw text
//! - Builders are pure over their inputs apart from random obfuscation paths
//! - An empty server list is an error, never an empty document

pub mod json;
pub mod rule_engine;
pub mod uri;

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{Server, UserInfo};
use crate::obfuscation::ObfuscationError;
use crate::storage::cache::CacheError;

pub use json::{JsonBuilder, JsonTemplate};
pub use rule_engine::{RuleEngineBuilder, RuleTemplate};
pub use uri::{UriBuilder, UriTemplate};

/// Resolver entries replaced by a server's DNS hint.
///
/// The misspelt variant exists in deployed templates.
pub const DNS_PLACEHOLDERS: [&str; 2] = ["DNS_PLACEHOLDER", "DNS_PLACEHODER"];

pub(crate) fn is_dns_placeholder(value: &str) -> bool {
    DNS_PLACEHOLDERS.contains(&value)
}

/// Errors raised while loading or validating a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Io(CacheError),

    #[error("{kind} template is not valid: {message}")]
    Syntax { kind: &'static str, message: String },

    #[error("template is missing required section '{0}'")]
    MissingSection(&'static str),

    #[error("template rejected: {0}")]
    Invalid(String),
}

impl From<CacheError> for TemplateError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(path) => Self::NotFound(path),
            other => Self::Io(other),
        }
    }
}

/// Errors raised while rendering a configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("user has no access to any servers")]
    NoServers,

    #[error(transparent)]
    Obfuscation(#[from] ObfuscationError),

    #[error("build failed: {0}")]
    Failed(String),
}

/// Common contract of the format builders.
pub trait ConfigBuilder {
    type Template;

    /// Render the output text for `user` over `servers`, in the given order.
    fn build(
        &self,
        user: &UserInfo,
        servers: &[Server],
        template: &Self::Template,
    ) -> Result<String, BuildError>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{parse_groups, Server, ServerKind, UserInfo};

    pub fn user() -> UserInfo {
        UserInfo::new(
            "550e8400-e29b-41d4-a716-446655440001",
            "aabbccdd",
            "user1",
            "Test User 1",
            parse_groups("premium"),
            None,
        )
    }

    pub fn server(host: &str, description: &str) -> Server {
        Server {
            host: host.to_string(),
            sni: format!("sni.{host}"),
            dns_hint: String::new(),
            public_key: format!("pk-{host}"),
            description: description.to_string(),
            groups: Default::default(),
            kind: ServerKind::Internal,
            proto_id: None,
            proto_short_id: None,
        }
    }

    pub fn external(host: &str, description: &str) -> Server {
        Server {
            kind: ServerKind::External,
            proto_id: Some("ext-uuid".to_string()),
            proto_short_id: Some("ext-short".to_string()),
            ..server(host, description)
        }
    }
}
