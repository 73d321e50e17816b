//! Server registry.
//!
//! Format: `host | sni | dns_hint | public_key | description | groups | type | proto_id | proto_short_id`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{parse_groups, Server, ServerKind};
use crate::storage::cache::{CacheError, FileCache};
use crate::storage::records::{decode_unicode_escapes, records, Record};
use crate::storage::RepositoryError;

const MAX_FIELDS: usize = 9;
const MIN_FIELDS: usize = 5;

/// Parse registry content in file order. Malformed lines are skipped with a
/// warning.
pub fn parse_servers(content: &str, source: &Path) -> Vec<Server> {
    records(content, MAX_FIELDS)
        .filter_map(|record| parse_record(&record, source))
        .collect()
}

fn parse_record(record: &Record<'_>, source: &Path) -> Option<Server> {
    if record.fields.len() < MIN_FIELDS {
        tracing::warn!(
            path = %source.display(),
            line = record.line,
            fields = record.fields.len(),
            "Skipping server line with too few fields"
        );
        return None;
    }

    let host = record.field(0);
    if host.is_empty() {
        tracing::warn!(path = %source.display(), line = record.line, "Skipping server line with empty host");
        return None;
    }

    let kind = match record.optional(6) {
        None => ServerKind::Internal,
        Some(raw) => ServerKind::parse(raw).unwrap_or_else(|| {
            tracing::warn!(
                path = %source.display(),
                line = record.line,
                value = %raw,
                "Unknown server type, defaulting to internal"
            );
            ServerKind::Internal
        }),
    };

    let sni = record
        .optional(1)
        .map(decode_unicode_escapes)
        .unwrap_or_else(|| host.to_string());
    let description = record
        .optional(4)
        .map(decode_unicode_escapes)
        .unwrap_or_else(|| host.to_string());

    Some(Server {
        host: host.to_string(),
        sni,
        dns_hint: record.field(2).to_string(),
        public_key: record.field(3).to_string(),
        description,
        groups: parse_groups(record.field(5)),
        kind,
        proto_id: record.optional(7).map(str::to_string),
        proto_short_id: record.optional(8).map(str::to_string),
    })
}

/// Cached access to the server registry file.
#[derive(Debug, Clone)]
pub struct ServerRepository {
    path: PathBuf,
    cache: Arc<FileCache<Vec<Server>>>,
}

impl ServerRepository {
    pub fn new(path: impl Into<PathBuf>, cache: Arc<FileCache<Vec<Server>>>) -> Self {
        Self {
            path: path.into(),
            cache,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All servers in file order. The servers file is required.
    pub fn load(&self) -> Result<Arc<Vec<Server>>, RepositoryError> {
        let path = self.path.clone();
        self.cache
            .get(&self.path, |content| Ok::<_, CacheError>(parse_servers(content, &path)))
            .map_err(RepositoryError::from)
    }
}
