//! Flat-file storage subsystem.
//!
//! # Data Flow
//! ```text
//! users / servers / template files
//!     → cache.rs (stat; reuse snapshot if (mtime, size) unchanged)
//!     → records.rs (line + field splitting)
//!     → users.rs / servers.rs / templates.rs (entity parsing, validation)
//!     → Arc<snapshot> shared with every request
//! ```
//!
//! # Design Decisions
//! - Caches are explicit objects created once at startup ([`CacheSet`]) and
//!   injected into repositories; there is no global state
//! - Line-level anomalies are logged and skipped, never fatal to a load

pub mod cache;
pub mod records;
pub mod servers;
pub mod templates;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::model::Server;
pub use cache::{CacheError, CacheStats, FileCache, Fingerprint};
pub use servers::ServerRepository;
pub use templates::{TemplateError, TemplateStore};
pub use users::{UserRepository, UserTable};

use crate::builders::json::JsonTemplate;
use crate::builders::rule_engine::RuleTemplate;
use crate::builders::uri::UriTemplate;

/// Errors raised by the registries.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A required file is missing.
    #[error("required file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no user matches link segment '{0}'")]
    UserNotFound(String),

    #[error(transparent)]
    Io(CacheError),
}

impl From<CacheError> for RepositoryError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(path) => Self::NotFound(path),
            other => Self::Io(other),
        }
    }
}

/// Every cache the process owns, one per parsed type.
#[derive(Debug, Default)]
pub struct CacheSet {
    pub users: Arc<FileCache<UserTable>>,
    pub servers: Arc<FileCache<Vec<Server>>>,
    pub rule_templates: Arc<FileCache<RuleTemplate>>,
    pub uri_templates: Arc<FileCache<UriTemplate>>,
    pub json_templates: Arc<FileCache<JsonTemplate>>,
}

impl CacheSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summed hit/miss counters across all caches.
    pub fn stats(&self) -> CacheStats {
        [
            self.users.stats(),
            self.servers.stats(),
            self.rule_templates.stats(),
            self.uri_templates.stats(),
            self.json_templates.stats(),
        ]
        .into_iter()
        .fold(CacheStats::default(), |acc, s| CacheStats {
            hits: acc.hits + s.hits,
            misses: acc.misses + s.misses,
        })
    }

    pub fn clear(&self) {
        self.users.clear();
        self.servers.clear();
        self.rule_templates.clear();
        self.uri_templates.clear();
        self.json_templates.clear();
    }
}
