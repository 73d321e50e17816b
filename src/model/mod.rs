//! Entity types loaded from the flat registries.
//!
//! # Design Decisions
//! - Entities are immutable once parsed; a reload replaces the whole
//!   collection, never individual fields
//! - Group sets are ordered (`BTreeSet`) so logs and summaries are stable

pub mod server;
pub mod user;

use std::collections::BTreeSet;

pub use server::{Server, ServerKind};
pub use user::UserInfo;

/// Group assigned to users that declare none.
pub const DEFAULT_GROUP: &str = "default";

/// Set of group names attached to a user or a server.
pub type GroupSet = BTreeSet<String>;

/// Split a comma-separated group field into a de-duplicated set.
///
/// Whitespace around names is trimmed and empty names are dropped. The
/// result may be empty; callers decide what an empty set means.
pub fn parse_groups(field: &str) -> GroupSet {
    field
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

/// Human-readable group list, `fallback` when the set is empty.
pub fn groups_summary(groups: &GroupSet, fallback: &str) -> String {
    if groups.is_empty() {
        return fallback.to_string();
    }
    groups.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
