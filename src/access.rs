//! Group-based server visibility.
//!
//! A user sees a server iff the server declares no groups, or the user and
//! server share at least one group. Output keeps registry order.

use crate::model::{Server, UserInfo};

/// Servers visible to `user`, in their original order.
pub fn visible_servers(user: &UserInfo, servers: &[Server]) -> Vec<Server> {
    servers
        .iter()
        .filter(|server| user.can_access(&server.groups))
        .cloned()
        .collect()
}
