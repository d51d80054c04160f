//! Configuration file management for horizon.
//!
//! Provides a TOML-based config file at `~/.config/horizon/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use horizon_core::generate::openai::OpenAiGenerator;
use horizon_core::generate::{GenerateError, Generator};
use horizon_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    /// API key for the generation backend. The `OPENAI_API_KEY` env var
    /// takes precedence.
    pub api_key: Option<String>,
    /// Model override for the generation backend.
    pub model: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the horizon config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/horizon` or `~/.config/horizon`.
/// We intentionally ignore the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("horizon");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("horizon")
}

/// Return the path to the horizon config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix (the file may hold an API key).
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct HorizonConfig {
    pub db_config: DbConfig,
    /// Resolved API key, if any. Generation commands fail with a
    /// configuration error when this is absent.
    pub api_key: Option<String>,
    /// Resolved model override, if any.
    pub model: Option<String>,
}

impl HorizonConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `HORIZON_DATABASE_URL` env > `config_file.database.url` > `DbConfig::DEFAULT_URL`
    /// - API key: `OPENAI_API_KEY` env > `config_file.generation.api_key` > none
    /// - Model: `config_file.generation.model` > backend default
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("HORIZON_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                file_config
                    .as_ref()
                    .and_then(|cfg| cfg.generation.api_key.clone())
            });

        let model = file_config.and_then(|cfg| cfg.generation.model);

        Ok(Self {
            db_config,
            api_key,
            model,
        })
    }

    /// Build the generation backend from the resolved settings.
    ///
    /// Fails with [`GenerateError::Config`] when no API key is available, so
    /// callers surface a misconfiguration rather than attempting a call.
    pub fn generator(&self, model_override: Option<&str>) -> Result<Arc<dyn Generator>, GenerateError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| GenerateError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let mut generator = OpenAiGenerator::new(api_key)?;
        if let Some(model) = model_override.map(str::to_owned).or_else(|| self.model.clone()) {
            generator = generator.with_model(model);
        }
        Ok(Arc::new(generator))
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
