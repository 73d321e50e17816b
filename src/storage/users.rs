//! User registry.
//!
//! Format: `identity | short_id | link_segment | label | groups | custom_template`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{parse_groups, UserInfo};
use crate::storage::cache::{CacheError, FileCache};
use crate::storage::records::{records, Record};
use crate::storage::RepositoryError;

const MAX_FIELDS: usize = 6;
const MIN_FIELDS: usize = 3;

/// Users in file order with an index on link segment.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: Vec<UserInfo>,
    by_link: HashMap<String, usize>,
}

impl UserTable {
    /// Parse registry content. Malformed lines are skipped with a warning.
    pub fn parse(content: &str, source: &Path) -> Self {
        let mut table = Self::default();

        for record in records(content, MAX_FIELDS) {
            let Some(user) = parse_record(&record, source) else {
                continue;
            };
            if table.by_link.contains_key(&user.link_segment) {
                tracing::warn!(
                    path = %source.display(),
                    line = record.line,
                    link = %user.link_segment,
                    "Duplicate link segment, keeping the first definition"
                );
                continue;
            }
            table
                .by_link
                .insert(user.link_segment.clone(), table.users.len());
            table.users.push(user);
        }

        table
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserInfo> {
        self.users.iter()
    }

    pub fn find_exact(&self, segment: &str) -> Option<&UserInfo> {
        self.by_link.get(segment).map(|&i| &self.users[i])
    }

    /// Exact match first, then the longest link segment that prefixes
    /// `segment`. Equal-length candidates resolve to the earliest line.
    pub fn find_by_link_prefix(&self, segment: &str) -> Option<&UserInfo> {
        if segment.is_empty() {
            return None;
        }
        if let Some(user) = self.find_exact(segment) {
            return Some(user);
        }

        let mut best: Option<&UserInfo> = None;
        for user in &self.users {
            if !segment.starts_with(user.link_segment.as_str()) {
                continue;
            }
            // strict comparison keeps the first of equal length
            if best.map_or(true, |b| user.link_segment.len() > b.link_segment.len()) {
                best = Some(user);
            }
        }
        best
    }
}

fn parse_record(record: &Record<'_>, source: &Path) -> Option<UserInfo> {
    if record.fields.len() < MIN_FIELDS {
        tracing::warn!(
            path = %source.display(),
            line = record.line,
            fields = record.fields.len(),
            "Skipping user line with too few fields"
        );
        return None;
    }

    let identity = record.field(0);
    let link_segment = record.field(2);
    if identity.is_empty() || link_segment.is_empty() {
        tracing::warn!(
            path = %source.display(),
            line = record.line,
            "Skipping user line with empty identity or link segment"
        );
        return None;
    }

    if uuid::Uuid::parse_str(identity).is_err() {
        tracing::warn!(
            path = %source.display(),
            line = record.line,
            link = %link_segment,
            "User identity is not a UUID"
        );
    }

    Some(UserInfo::new(
        identity,
        record.field(1),
        link_segment,
        record.field(3),
        parse_groups(record.field(4)),
        record.optional(5).map(str::to_string),
    ))
}

/// Cached access to the user registry file.
#[derive(Debug, Clone)]
pub struct UserRepository {
    path: PathBuf,
    cache: Arc<FileCache<UserTable>>,
}

impl UserRepository {
    pub fn new(path: impl Into<PathBuf>, cache: Arc<FileCache<UserTable>>) -> Self {
        Self {
            path: path.into(),
            cache,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current user table. A missing file is an empty registry.
    pub fn load(&self) -> Result<Arc<UserTable>, RepositoryError> {
        let path = self.path.clone();
        match self
            .cache
            .get(&self.path, |content| Ok::<_, CacheError>(UserTable::parse(content, &path)))
        {
            Ok(table) => Ok(table),
            Err(CacheError::NotFound(p)) => {
                tracing::warn!(path = %p.display(), "Users file not found, treating as empty");
                Ok(Arc::new(UserTable::default()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a user by link segment (exact, then longest prefix).
    pub fn find_by_link_prefix(&self, segment: &str) -> Result<UserInfo, RepositoryError> {
        self.load()?
            .find_by_link_prefix(segment)
            .cloned()
            .ok_or_else(|| RepositoryError::UserNotFound(segment.to_string()))
    }
}
