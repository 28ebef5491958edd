//! Role key type stored on memberships and invitations.
//!
//! The full role definition (display name + permission list) lives in the
//! core crate's role registry; rows only persist the key.

use std::fmt;

/// Role key wrapper.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoleKey(pub String);

impl RoleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
