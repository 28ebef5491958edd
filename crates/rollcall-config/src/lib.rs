use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found. Create ~/.rollcall/config.json first.")]
    NotFound,
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Role '{0}' not found")]
    RoleNotFound(String),
}

/// A role definition as configured by the operator.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoleConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Service configuration stored in ~/.rollcall/config.json
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceConfig {
    pub roles: Vec<RoleConfig>,
    /// Hours before a pending invitation lapses
    #[serde(default = "default_invite_expiry_hours")]
    pub invite_expiry_hours: u32,
    /// Storage backend URL; defaults to the sqlite file under ~/.rollcall
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_invite_expiry_hours() -> u32 {
    72
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            roles: vec![
                RoleConfig {
                    key: "admin".to_string(),
                    name: "Administrator".to_string(),
                    description: Some("Administrator users can perform any action.".to_string()),
                    permissions: vec![
                        "create".to_string(),
                        "read".to_string(),
                        "update".to_string(),
                        "delete".to_string(),
                    ],
                },
                RoleConfig {
                    key: "editor".to_string(),
                    name: "Editor".to_string(),
                    description: Some(
                        "Editor users have the ability to read, create, and update.".to_string(),
                    ),
                    permissions: vec![
                        "create".to_string(),
                        "read".to_string(),
                        "update".to_string(),
                    ],
                },
            ],
            invite_expiry_hours: default_invite_expiry_hours(),
            database_url: None,
        }
    }
}

impl ServiceConfig {
    /// Load config from default path (~/.rollcall/config.json)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::Read(e)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save config to default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to custom path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self)?)?;
        Ok(())
    }

    /// Get default config path (~/.rollcall/config.json)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rollcall")
            .join("config.json")
    }

    /// Get a role by key
    pub fn get_role(&self, key: &str) -> Result<&RoleConfig, ConfigError> {
        self.roles
            .iter()
            .find(|r| r.key == key)
            .ok_or_else(|| ConfigError::RoleNotFound(key.to_string()))
    }
}
