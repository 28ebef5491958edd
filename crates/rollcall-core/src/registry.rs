//! Process-wide catalog of role definitions.
//!
//! The registry is populated once at startup from configuration and read
//! everywhere afterwards. It is not designed for concurrent mutation; share
//! it behind an `Arc` after registration is done.

use rollcall_config::ServiceConfig;
use rollcall_storage::RoleKey;

/// A named bundle of permission strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub key: RoleKey,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

impl Role {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Catalog mapping role keys to role definitions plus the merged permission
/// set across all registered roles.
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: Vec<Role>,
    permissions: Vec<String>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let mut registry = Self::new();
        for role in &config.roles {
            registry.register(
                &role.key,
                &role.name,
                role.description.as_deref(),
                role.permissions.clone(),
            );
        }
        registry
    }

    /// Add or overwrite a role definition.
    ///
    /// The role's permissions are merged into the global catalog, which is
    /// kept deduplicated and sorted so iteration order is deterministic.
    pub fn register(
        &mut self,
        key: &str,
        name: &str,
        description: Option<&str>,
        permissions: Vec<String>,
    ) {
        for permission in &permissions {
            if !self.permissions.contains(permission) {
                self.permissions.push(permission.clone());
            }
        }
        self.permissions.sort();

        let role = Role {
            key: RoleKey::from(key),
            name: name.to_string(),
            description: description.map(str::to_string),
            permissions,
        };

        match self.roles.iter_mut().find(|r| r.key.as_str() == key) {
            Some(existing) => *existing = role,
            None => self.roles.push(role),
        }
    }

    pub fn find(&self, key: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.key.as_str() == key)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// The merged permission catalog (deduplicated, sorted).
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn has_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    pub fn has_permissions(&self) -> bool {
        !self.permissions.is_empty()
    }

    /// Filter `candidates` down to permissions present in the catalog.
    ///
    /// The candidates' own order is preserved; unknown entries are dropped.
    pub fn valid_permissions(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|c| self.permissions.contains(c))
            .cloned()
            .collect()
    }

    /// Whether the role named by `key` grants `permission`.
    pub fn role_has_permission(&self, key: &str, permission: &str) -> bool {
        self.find(key).is_some_and(|r| r.has_permission(permission))
    }
}
