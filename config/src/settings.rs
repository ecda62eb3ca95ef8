//! Server settings stored in settings.toml

use crate::PathManager;
use crate::crypto::CredentialCipher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    /// Static session tokens accepted by the server (token -> user).
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
    /// Per-vendor overrides keyed by vendor name ("openai", "anthropic", ...).
    #[serde(default)]
    pub vendors: HashMap<String, VendorSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Externally reachable origin of this server, used to turn relative
    /// attachment locators into absolute URLs.
    pub public_base_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_base_url: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageSettings {
    pub database_path: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VendorSettings {
    /// Sealed with [`CredentialCipher`]; never stored in plain text.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Settings {
    /// Load settings from the default settings file, or return defaults if
    /// the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
    }

    /// Resolve the API key for a vendor. The environment variable wins over
    /// the sealed value in the settings file.
    pub fn api_key(&self, vendor: &str, env_var: &str) -> Option<String> {
        if let Ok(key) = std::env::var(env_var) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        let sealed = self.vendors.get(vendor)?.api_key.as_ref()?;
        CredentialCipher::from_environment().open(sealed).ok()
    }

    /// Seal and store an API key for a vendor.
    pub fn set_api_key(&mut self, vendor: &str, api_key: &str) -> Result<(), String> {
        let sealed = CredentialCipher::from_environment().seal(api_key)?;
        self.vendors.entry(vendor.to_string()).or_default().api_key = Some(sealed);
        Ok(())
    }

    pub fn base_url(&self, vendor: &str, env_var: &str) -> Option<String> {
        std::env::var(env_var)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.vendors.get(vendor)?.base_url.clone())
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(PathManager::db_path)
    }

    pub fn uploads_dir(&self) -> Option<PathBuf> {
        self.storage.uploads_dir.clone().or_else(PathManager::uploads_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.server.bind_address, "127.0.0.1:3000");
        assert!(settings.sessions.is_empty());
        assert!(settings.vendors.is_empty());
    }

    #[test]
    fn test_parse_sessions_and_vendors() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            bind_address = "0.0.0.0:8080"
            public_base_url = "https://chat.example.com"

            [[sessions]]
            token = "abc"
            user_id = "user-1"

            [vendors.gemini]
            base_url = "http://localhost:9999"
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.sessions[0].user_id, "user-1");
        assert_eq!(
            settings.base_url("gemini", "RELAY_TEST_UNSET_BASE_URL").as_deref(),
            Some("http://localhost:9999")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.sessions.push(SessionEntry {
            token: "t".into(),
            user_id: "u".into(),
        });
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.sessions.len(), 1);
        assert_eq!(loaded.sessions[0].token, "t");
    }

    #[test]
    fn test_sealed_api_key_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.set_api_key("groq", "gsk-secret-value").unwrap();
        settings.save_to(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("[vendors.groq]"));
        assert!(!raw.contains("gsk-secret-value"));

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(
            loaded.api_key("groq", "RELAY_TEST_UNSET_GROQ_KEY").as_deref(),
            Some("gsk-secret-value")
        );
    }

    #[test]
    fn test_missing_api_key_is_none() {
        let settings = Settings::default();
        assert!(settings.api_key("openai", "RELAY_TEST_UNSET_API_KEY").is_none());
    }
}
