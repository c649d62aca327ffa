//! Configuration Module
//!
//! Source settings are layered, highest priority first:
//!
//! 1. Command-line flags
//! 2. `[environments.<name>]` section of the config file (selected by `--environment`)
//! 3. `[defaults]` section of the config file
//! 4. Defaults (github-style vars/secrets, Key Vault enabled when a vault is named)
//!
//! The config file is looked up at `--config <path>`, then
//! `./manifest-subst.toml`, then `~/.config/manifest-subst/config.toml`.
//!
//! ```toml
//! [defaults]
//! vars_source = "github"
//! timeout_secs = 10
//!
//! [environments.dev]
//! keyvault_name = "app-dev-kv"
//!
//! [environments.prod]
//! keyvault_name = "app-prod-kv"
//! max_retries = 4
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SubstError};
use crate::source::vault_url;
use crate::util::constants::{DEFAULT_MAX_RETRIES, FETCH_TIMEOUT, SECRETS_PREFIX, VARS_PREFIX};

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "manifest-subst.toml";

/// Where `vars:` / `secrets:` values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceMode {
    /// Prefixed environment variables exported by the CI job (`VARS_*`, `SECRETS_*`)
    Github,
    /// Local runs: vars from the whole environment, secrets still `SECRETS_*`
    Env,
}

/// Whether `kv:` is backed by Azure Key Vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KvMode {
    AzureKeyvault,
    None,
}

/// One layer of source settings; unset fields fall through to lower layers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub vars_source: Option<SourceMode>,
    pub secrets_source: Option<SourceMode>,
    pub kv_source: Option<KvMode>,
    pub keyvault_name: Option<String>,
    /// Full vault URL, overrides `keyvault_name` (sovereign clouds, private endpoints)
    pub keyvault_url: Option<String>,
    pub vars_prefix: Option<String>,
    pub secrets_prefix: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

impl SourceConfig {
    /// Overlay `over` on top of `self`: fields set in `over` win
    pub fn merge(self, over: SourceConfig) -> SourceConfig {
        SourceConfig {
            vars_source: over.vars_source.or(self.vars_source),
            secrets_source: over.secrets_source.or(self.secrets_source),
            kv_source: over.kv_source.or(self.kv_source),
            keyvault_name: over.keyvault_name.or(self.keyvault_name),
            keyvault_url: over.keyvault_url.or(self.keyvault_url),
            vars_prefix: over.vars_prefix.or(self.vars_prefix),
            secrets_prefix: over.secrets_prefix.or(self.secrets_prefix),
            timeout_secs: over.timeout_secs.or(self.timeout_secs),
            max_retries: over.max_retries.or(self.max_retries),
        }
    }
}

/// Contents of a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub defaults: SourceConfig,

    #[serde(default)]
    pub environments: BTreeMap<String, SourceConfig>,
}

impl FileConfig {
    /// Get the user config file path
    ///
    /// Returns `~/.config/manifest-subst/config.toml` on Unix
    pub fn user_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("manifest-subst")
            .join("config.toml")
    }

    /// Parse from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SubstError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Load a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SubstError::ConfigError {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::parse(&content)
    }

    /// Find and load the config file
    ///
    /// An explicit path must exist. Without one, the local and user config
    /// files are tried in turn; if neither exists the default config is used.
    pub fn discover(explicit: Option<&Path>) -> Result<(Option<PathBuf>, Self)> {
        if let Some(path) = explicit {
            return Ok((Some(path.to_path_buf()), Self::load_from(path)?));
        }

        for candidate in [PathBuf::from(LOCAL_CONFIG_FILE), Self::user_config_path()] {
            if candidate.is_file() {
                let config = Self::load_from(&candidate)?;
                return Ok((Some(candidate), config));
            }
        }

        Ok((None, Self::default()))
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub environment: Option<String>,
    pub vars_source: SourceMode,
    pub secrets_source: SourceMode,
    pub kv_source: KvMode,
    pub keyvault_name: Option<String>,
    pub keyvault_url: Option<String>,
    pub vars_prefix: String,
    pub secrets_prefix: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(&FileConfig::default(), None, SourceConfig::default())
    }
}

impl Settings {
    /// Layer CLI flags over the selected environment section over the file defaults
    pub fn resolve(file: &FileConfig, environment: Option<&str>, cli: SourceConfig) -> Self {
        let mut layered = file.defaults.clone();

        if let Some(name) = environment {
            match file.environments.get(name) {
                Some(section) => layered = layered.merge(section.clone()),
                None => tracing::debug!(environment = name, "No config section for environment"),
            }
        }

        let layered = layered.merge(cli);

        Self {
            environment: environment.map(str::to_string),
            vars_source: layered.vars_source.unwrap_or(SourceMode::Github),
            secrets_source: layered.secrets_source.unwrap_or(SourceMode::Github),
            kv_source: layered.kv_source.unwrap_or(KvMode::AzureKeyvault),
            keyvault_name: layered.keyvault_name.filter(|n| !n.is_empty()),
            keyvault_url: layered.keyvault_url.filter(|u| !u.is_empty()),
            vars_prefix: layered.vars_prefix.unwrap_or_else(|| VARS_PREFIX.to_string()),
            secrets_prefix: layered.secrets_prefix.unwrap_or_else(|| SECRETS_PREFIX.to_string()),
            // zero would time out every request
            timeout: layered
                .timeout_secs
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(FETCH_TIMEOUT),
            max_retries: layered.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    /// Base URL of the vault backing `kv`, if Key Vault is wanted and identified
    ///
    /// An explicit URL wins over a vault name; the name is validated.
    pub fn keyvault_target(&self) -> Result<Option<String>> {
        match (self.kv_source, &self.keyvault_url, &self.keyvault_name) {
            (KvMode::None, _, _) => Ok(None),
            (KvMode::AzureKeyvault, Some(url), _) => Ok(Some(url.clone())),
            (KvMode::AzureKeyvault, None, Some(name)) => vault_url(name).map(Some),
            (KvMode::AzureKeyvault, None, None) => Ok(None),
        }
    }
}
