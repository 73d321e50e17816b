//! User registry entity.

use super::{GroupSet, DEFAULT_GROUP};

/// A subscriber and the credentials embedded in their profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Opaque stable credential (usually a UUID).
    pub identity: String,

    /// Protocol short id, empty when the user has none.
    pub short_id: String,

    /// Public path segment identifying the user. Unique per registry.
    pub link_segment: String,

    /// Human-readable label.
    pub label: String,

    /// Never empty: an empty declaration becomes `{DEFAULT_GROUP}`.
    pub groups: GroupSet,

    /// File name of a custom rule-engine template, if any.
    pub custom_template: Option<String>,
}

impl UserInfo {
    /// Build a user, normalising an empty group set to the default group.
    pub fn new(
        identity: impl Into<String>,
        short_id: impl Into<String>,
        link_segment: impl Into<String>,
        label: impl Into<String>,
        groups: GroupSet,
        custom_template: Option<String>,
    ) -> Self {
        let groups = if groups.is_empty() {
            GroupSet::from([DEFAULT_GROUP.to_string()])
        } else {
            groups
        };

        Self {
            identity: identity.into(),
            short_id: short_id.into(),
            link_segment: link_segment.into(),
            label: label.into(),
            groups,
            custom_template,
        }
    }

    /// True if the user may see a server carrying `server_groups`.
    ///
    /// An empty server group set is a wildcard.
    pub fn can_access(&self, server_groups: &GroupSet) -> bool {
        server_groups.is_empty() || !self.groups.is_disjoint(server_groups)
    }

    /// Shortened identity for log lines.
    pub fn identity_hint(&self) -> &str {
        let end = self
            .identity
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.identity.len());
        &self.identity[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_groups;

    fn user(groups: &str) -> UserInfo {
        UserInfo::new("id", "sid", "link", "Label", parse_groups(groups), None)
    }

    #[test]
    fn test_empty_groups_become_default() {
        let u = user("");
        assert_eq!(u.groups, GroupSet::from(["default".to_string()]));
    }

    #[test]
    fn test_can_access() {
        let u = user("vip");
        assert!(u.can_access(&GroupSet::new()));
        assert!(u.can_access(&parse_groups("vip,other")));
        assert!(!u.can_access(&parse_groups("premium")));
        // default group is a real group, not a wildcard
        assert!(!user("").can_access(&parse_groups("vip")));
        assert!(user("").can_access(&parse_groups("default")));
    }

    #[test]
    fn test_identity_hint() {
        let u = UserInfo::new(
            "550e8400-e29b-41d4-a716-446655440000",
            "",
            "l",
            "",
            GroupSet::new(),
            None,
        );
        assert_eq!(u.identity_hint(), "550e8400");
        assert_eq!(user("").identity_hint(), "id");
    }
}
