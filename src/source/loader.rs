//! Registry construction from resolved settings
//!
//! The process environment is captured once with [`capture_env`] and passed in
//! explicitly; nothing below reads ambient state.
//!
//! | Kind | `github` mode | `env` mode |
//! |------|---------------|------------|
//! | `vars` | `VARS_*`, prefix stripped | whole environment |
//! | `secrets` | `SECRETS_*`, prefix stripped | `SECRETS_*`, prefix stripped |
//! | `env` | whole environment (always registered) | same |
//! | `kv` | Key Vault when a vault is configured, else unregistered | same |

use std::collections::HashMap;
use std::sync::Arc;

use super::credential::{ChainedCredential, TokenCredential};
use super::keyvault::{KeyVaultOptions, KeyVaultProvider};
use super::{MapProvider, SourceKind, SourceRegistry};
use crate::config::{Settings, SourceMode};
use crate::error::Result;
use crate::util::RetryConfig;

/// Snapshot of the process environment (non-UTF-8 entries are skipped)
pub fn capture_env() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Build the registry using the default Azure credential chain for `kv`
pub fn build_registry(settings: &Settings, env: &HashMap<String, String>) -> Result<SourceRegistry> {
    let credential: Arc<dyn TokenCredential> = Arc::new(ChainedCredential::from_env(env));
    build_registry_with_credential(settings, env, credential)
}

/// Build the registry with an explicit Key Vault credential
pub fn build_registry_with_credential(
    settings: &Settings,
    env: &HashMap<String, String>,
    credential: Arc<dyn TokenCredential>,
) -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();

    let vars = match settings.vars_source {
        SourceMode::Github => MapProvider::from_prefixed(env.clone(), &settings.vars_prefix),
        SourceMode::Env => MapProvider::from_map(env.clone()),
    };
    tracing::info!(mode = ?settings.vars_source, count = vars.len(), "Loaded vars source");
    registry.register(SourceKind::Vars, vars);

    // secrets read the prefixed variables in both modes
    let secrets = MapProvider::from_prefixed(env.clone(), &settings.secrets_prefix);
    tracing::info!(mode = ?settings.secrets_source, count = secrets.len(), "Loaded secrets source");
    registry.register(SourceKind::Secrets, secrets);

    match settings.keyvault_target()? {
        Some(url) => {
            let options = KeyVaultOptions {
                timeout: settings.timeout,
                retry: RetryConfig::default().with_max_retries(settings.max_retries),
            };
            let provider = KeyVaultProvider::new(&url, credential, options)?;
            tracing::info!(vault = %provider.vault(), "Key Vault source enabled (on-demand)");
            registry.register(SourceKind::Kv, provider);
        }
        None => tracing::info!("Key Vault source not configured"),
    }

    registry.register(SourceKind::Env, MapProvider::from_map(env.clone()));

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, KvMode, SourceConfig};
    use crate::source::credential::StaticTokenCredential;

    fn env() -> HashMap<String, String> {
        [
            ("VARS_HOST", "db.internal"),
            ("SECRETS_TOKEN", "t0k3n"),
            ("HOME", "/home/ci"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn settings(cli: SourceConfig) -> Settings {
        Settings::resolve(&FileConfig::default(), None, cli)
    }

    fn credential() -> Arc<dyn TokenCredential> {
        Arc::new(StaticTokenCredential::new("test"))
    }

    #[tokio::test]
    async fn test_github_mode() {
        let registry = build_registry_with_credential(&settings(SourceConfig::default()), &env(), credential()).unwrap();

        assert_eq!(
            registry.kinds(),
            vec![SourceKind::Vars, SourceKind::Secrets, SourceKind::Env]
        );
        let host = registry.lookup(SourceKind::Vars, "HOST").await.unwrap();
        assert_eq!(host.as_deref(), Some("db.internal"));
        let token = registry.lookup(SourceKind::Secrets, "TOKEN").await.unwrap();
        assert_eq!(token.as_deref(), Some("t0k3n"));
        let home = registry.lookup(SourceKind::Vars, "HOME").await.unwrap();
        assert_eq!(home, None);
    }

    #[tokio::test]
    async fn test_env_mode_vars_sees_everything() {
        let cli = SourceConfig {
            vars_source: Some(SourceMode::Env),
            ..Default::default()
        };
        let registry = build_registry_with_credential(&settings(cli), &env(), credential()).unwrap();

        let home = registry.lookup(SourceKind::Vars, "HOME").await.unwrap();
        assert_eq!(home.as_deref(), Some("/home/ci"));
        let raw = registry.lookup(SourceKind::Vars, "VARS_HOST").await.unwrap();
        assert_eq!(raw.as_deref(), Some("db.internal"));
    }

    #[tokio::test]
    async fn test_env_source_always_present() {
        let cli = SourceConfig {
            kv_source: Some(KvMode::None),
            ..Default::default()
        };
        let registry = build_registry_with_credential(&settings(cli), &env(), credential()).unwrap();
        let home = registry.lookup(SourceKind::Env, "HOME").await.unwrap();
        assert_eq!(home.as_deref(), Some("/home/ci"));
    }

    #[test]
    fn test_kv_registered_with_vault_name() {
        let cli = SourceConfig {
            keyvault_name: Some("app-dev-kv".into()),
            ..Default::default()
        };
        let registry = build_registry_with_credential(&settings(cli), &env(), credential()).unwrap();
        assert!(registry.has(SourceKind::Kv));
    }

    #[test]
    fn test_kv_none_mode_skips_vault() {
        let cli = SourceConfig {
            keyvault_name: Some("x".into()),
            kv_source: Some(KvMode::None),
            ..Default::default()
        };
        let registry = build_registry_with_credential(&settings(cli), &env(), credential()).unwrap();
        assert!(!registry.has(SourceKind::Kv));
    }

    #[test]
    fn test_invalid_vault_name_is_error() {
        let cli = SourceConfig {
            keyvault_name: Some("no".into()),
            ..Default::default()
        };
        let result = build_registry_with_credential(&settings(cli), &env(), credential());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let cli = SourceConfig {
            vars_prefix: Some("APP_".into()),
            ..Default::default()
        };
        let mut env = env();
        env.insert("APP_NAME".into(), "web".into());
        let registry = build_registry_with_credential(&settings(cli), &env, credential()).unwrap();
        let name = registry.lookup(SourceKind::Vars, "NAME").await.unwrap();
        assert_eq!(name.as_deref(), Some("web"));
        let host = registry.lookup(SourceKind::Vars, "HOST").await.unwrap();
        assert_eq!(host, None);
    }
}
