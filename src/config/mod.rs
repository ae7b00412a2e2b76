//! Configuration management.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API server configuration.
    pub api: ApiConfig,

    /// Worktree configuration.
    pub worktree: WorktreeConfig,

    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// Loads global config first, then merges project-local config if
    /// present.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let global_path = Self::config_path()?;
        let mut config = if global_path.exists() {
            let contents = std::fs::read_to_string(&global_path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(project_path) = Self::project_config_path() {
            if project_path.exists() {
                let contents = std::fs::read_to_string(&project_path)?;
                let project_config: Self = toml::from_str(&contents)?;
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// Get the project-local configuration file path
    /// (`.cassi/config.toml` in the current directory).
    pub fn project_config_path() -> anyhow::Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(cwd.join(".cassi").join("config.toml"))
    }

    /// Merge another config into this one (project overrides global).
    fn merge(&mut self, other: Self) {
        let defaults = Self::default();

        if other.api.host != defaults.api.host {
            self.api.host = other.api.host;
        }
        if other.api.port != defaults.api.port {
            self.api.port = other.api.port;
        }
        if other.api.token.is_some() {
            self.api.token = other.api.token;
        }
        if other.worktree.install_command != defaults.worktree.install_command {
            self.worktree.install_command = other.worktree.install_command;
        }
        if other.scheduler.tick_ms != defaults.scheduler.tick_ms {
            self.scheduler.tick_ms = other.scheduler.tick_ms;
        }
    }

    /// Get the configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the config directory path (`~/.config/cassi/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config_home).join("cassi"));
        }

        if cfg!(target_os = "macos") {
            if let Ok(home) = std::env::var("HOME") {
                return Ok(PathBuf::from(home).join(".config").join("cassi"));
            }
        }

        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

        Ok(base.config_dir().join("cassi"))
    }
}

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// API token for authentication (optional, but required for remote
    /// access). Can also be set via `CASSI_API_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7070,
            token: None,
        }
    }
}

impl ApiConfig {
    /// Get the API token, preferring env var over config file.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var("CASSI_API_TOKEN")
            .ok()
            .or_else(|| self.token.clone())
    }

    /// Generate a new random API token.
    #[must_use]
    pub fn generate_token() -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        let bytes: [u8; 32] = rng.random();
        format!("cassi_{}", hex::encode(bytes))
    }
}

/// Worktree configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorktreeConfig {
    /// Dependency install command run inside a fresh worktree.
    pub install_command: String,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            install_command: crate::core::worktree::DEFAULT_INSTALL_COMMAND.to_string(),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period in milliseconds.
    pub tick_ms: u64,
}

impl SchedulerConfig {
    /// Tick period as a [`Duration`].
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 50 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 7070);
        assert_eq!(config.worktree.install_command, "npm install");
        assert_eq!(config.scheduler.tick(), Duration::from_millis(50));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [worktree]
            install_command = "cargo fetch"
            "#,
        )
        .unwrap();

        assert_eq!(config.worktree.install_command, "cargo fetch");
        assert_eq!(config.api.port, 7070);
    }

    #[test]
    fn project_config_overrides_global() {
        let mut global: Config = toml::from_str(
            r#"
            [api]
            port = 9000
            token = "cassi_global"
            "#,
        )
        .unwrap();

        let project: Config = toml::from_str(
            r#"
            [api]
            port = 9001

            [scheduler]
            tick_ms = 100
            "#,
        )
        .unwrap();

        global.merge(project);

        assert_eq!(global.api.port, 9001);
        // Project file set no token, so the global one survives.
        assert_eq!(global.api.token.as_deref(), Some("cassi_global"));
        assert_eq!(global.scheduler.tick_ms, 100);
    }

    #[test]
    fn generated_tokens_are_unique_and_prefixed() {
        let a = ApiConfig::generate_token();
        let b = ApiConfig::generate_token();
        assert!(a.starts_with("cassi_"));
        assert_eq!(a.len(), "cassi_".len() + 64);
        assert_ne!(a, b);
    }
}
