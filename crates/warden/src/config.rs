use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Authentication configuration.
///
/// Production deployments supply the issuer's public verification key.
/// `dev_issuer = true` generates an in-process issuer instead — explicitly
/// non-production, for local development only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Hex-encoded 32-byte Ed25519 public key of the credential issuer.
    #[serde(default)]
    pub verifying_key_hex: Option<String>,

    /// Enable the in-process dev issuer. Never enable in production.
    #[serde(default)]
    pub dev_issuer: bool,
}

/// Policy engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Internal check budget in milliseconds.
    #[serde(default = "default_check_budget_ms")]
    pub check_budget_ms: u64,
}

fn default_check_budget_ms() -> u64 {
    warden_policy::CHECK_BUDGET_MS
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            check_budget_ms: default_check_budget_ms(),
        }
    }
}

/// One provider profile as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub dialect: String,
    pub credential_ref: String,
    pub endpoint: String,
    #[serde(default)]
    pub priority: u32,
}

/// Top-level configuration for the Warden gateway binary.
///
/// Loaded from a TOML file (typically `~/.warden/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Statically provisioned secrets, keyed by logical name. A production
    /// deployment points `credential_ref` at an external secret source
    /// instead.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

impl RootConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if !self.auth.dev_issuer {
            match &self.auth.verifying_key_hex {
                Some(key_hex) => {
                    let bytes = hex::decode(key_hex)
                        .map_err(|_| RootError::Config("verifying_key_hex is not valid hex".into()))?;
                    if bytes.len() != 32 {
                        return Err(RootError::Config(format!(
                            "verifying_key_hex must be 32 bytes, got {}",
                            bytes.len()
                        )));
                    }
                }
                None => {
                    return Err(RootError::Config(
                        "either auth.verifying_key_hex or auth.dev_issuer is required".into(),
                    ));
                }
            }
        }
        if self.policy.check_budget_ms == 0 {
            return Err(RootError::Config("policy.check_budget_ms must be > 0".into()));
        }
        let mut names: Vec<&str> = self.providers.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.providers.len() {
            return Err(RootError::Config("provider names must be unique".into()));
        }
        for provider in &self.providers {
            if provider.name.is_empty() || provider.endpoint.is_empty() {
                return Err(RootError::Config(
                    "provider name and endpoint must be non-empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".warden/config.toml"))
            .unwrap_or_else(|_| PathBuf::from(".warden/config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> RootConfig {
        RootConfig {
            auth: AuthConfig {
                verifying_key_hex: None,
                dev_issuer: true,
            },
            ..RootConfig::default()
        }
    }

    #[test]
    fn test_default_config_requires_auth_material() {
        let config = RootConfig::default();
        assert!(config.validate().is_err());
        assert!(dev_config().validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[server]
bind = "0.0.0.0"
port = 8080

[auth]
dev_issuer = true

[policy]
check_budget_ms = 50

[[providers]]
name = "primary"
dialect = "openai"
credential_ref = "primary-key"
endpoint = "https://api.example.com/v1/chat/completions"
priority = 1

[[providers]]
name = "fallback"
dialect = "anthropic"
credential_ref = "fallback-key"
endpoint = "https://api.other.example/v1/messages"
priority = 2

[secrets]
primary-key = "sk-test"
"#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.policy.check_budget_ms, 50);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].dialect, "anthropic");
        assert_eq!(config.secrets.get("primary-key").unwrap(), "sk-test");
    }

    #[test]
    fn test_validate_bad_verifying_key() {
        let mut config = RootConfig::default();
        config.auth.verifying_key_hex = Some("zz".into());
        assert!(config.validate().is_err());

        config.auth.verifying_key_hex = Some("ab".repeat(16));
        assert!(config.validate().is_ok());

        config.auth.verifying_key_hex = Some("ab".repeat(8));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_provider_names() {
        let mut config = dev_config();
        config.providers = vec![
            ProviderConfig {
                name: "a".into(),
                dialect: "openai".into(),
                credential_ref: "k".into(),
                endpoint: "https://x".into(),
                priority: 1,
            },
            ProviderConfig {
                name: "a".into(),
                dialect: "openai".into(),
                credential_ref: "k".into(),
                endpoint: "https://y".into(),
                priority: 2,
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_budget() {
        let mut config = dev_config();
        config.policy.check_budget_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = RootConfig::load(Path::new("/nonexistent/warden.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = dev_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: RootConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.bind, restored.server.bind);
        assert_eq!(config.auth.dev_issuer, restored.auth.dev_issuer);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join(format!(
            "warden-test-config-{:?}-{}",
            std::thread::current().id(),
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = dev_config();
        config.server.port = 9999;
        config.save(&path).unwrap();

        let loaded = RootConfig::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9999);
        assert!(loaded.auth.dev_issuer);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
