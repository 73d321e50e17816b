//! Server registry entity.

use super::GroupSet;

/// Whether a server is operated by us or shared from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerKind {
    /// Our server: user credentials and obfuscation paths apply.
    #[default]
    Internal,
    /// Shared server with its own fixed protocol identity.
    External,
}

impl ServerKind {
    /// Case-insensitive parse; `None` for unrecognised values.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

/// One connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub host: String,

    /// SNI presented to the server. Defaults to `host`.
    pub sni: String,

    /// DNS resolver hint, empty when unset.
    pub dns_hint: String,

    pub public_key: String,

    pub description: String,

    /// Empty means visible to every user.
    pub groups: GroupSet,

    pub kind: ServerKind,

    /// Fixed identity, only meaningful for external servers.
    pub proto_id: Option<String>,

    /// Fixed short id, only meaningful for external servers.
    pub proto_short_id: Option<String>,
}

impl Server {
    pub fn is_external(&self) -> bool {
        self.kind == ServerKind::External
    }

    /// Identity to embed for `user_identity` on this server.
    pub fn effective_id<'a>(&'a self, user_identity: &'a str) -> &'a str {
        match (&self.kind, &self.proto_id) {
            (ServerKind::External, Some(id)) => id,
            _ => user_identity,
        }
    }

    /// Short id to embed for `user_short_id` on this server.
    pub fn effective_short_id<'a>(&'a self, user_short_id: &'a str) -> &'a str {
        match (&self.kind, &self.proto_short_id) {
            (ServerKind::External, Some(sid)) => sid,
            _ => user_short_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: ServerKind) -> Server {
        Server {
            host: "h.example.com".into(),
            sni: "h.example.com".into(),
            dns_hint: String::new(),
            public_key: "pk".into(),
            description: "H".into(),
            groups: GroupSet::new(),
            kind,
            proto_id: Some("ext-id".into()),
            proto_short_id: Some("ext-sid".into()),
        }
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ServerKind::parse("EXTERNAL"), Some(ServerKind::External));
        assert_eq!(ServerKind::parse(" internal "), Some(ServerKind::Internal));
        assert_eq!(ServerKind::parse("bogus"), None);
    }

    #[test]
    fn test_effective_ids() {
        let ext = server(ServerKind::External);
        assert_eq!(ext.effective_id("user-id"), "ext-id");
        assert_eq!(ext.effective_short_id("user-sid"), "ext-sid");

        // proto fields are ignored on internal servers
        let int = server(ServerKind::Internal);
        assert_eq!(int.effective_id("user-id"), "user-id");
        assert_eq!(int.effective_short_id("user-sid"), "user-sid");
    }
}
