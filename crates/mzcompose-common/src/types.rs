//! Domain primitive types used across the mzcompose workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The user and group ids of the invoking host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostUser {
    /// Numeric user id.
    pub uid: u32,
    /// Numeric group id.
    pub gid: u32,
}

impl HostUser {
    /// Creates a host identity from explicit ids.
    #[must_use]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Captures the real user and group ids of the current process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }

    /// Renders the `uid:gid` pair used as a service `user` directive.
    #[must_use]
    pub fn user_directive(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HostUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directive_is_uid_colon_gid() {
        assert_eq!(HostUser::new(1000, 100).user_directive(), "1000:100");
    }

    #[test]
    fn current_matches_process_ids() {
        let me = HostUser::current();
        assert_eq!(me.uid, nix::unistd::getuid().as_raw());
        assert_eq!(me.gid, nix::unistd::getgid().as_raw());
    }
}
