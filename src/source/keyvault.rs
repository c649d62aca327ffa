//! Azure Key Vault provider
//!
//! Fetches one secret per lookup via the Key Vault REST API:
//! `GET {vault}/secrets/{name}?api-version=7.4` with a bearer token.
//!
//! Nothing is prefetched and no secret value is cached: two tokens naming the
//! same secret produce two requests. Only the access token is cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use super::credential::{AccessToken, TokenCredential};
use super::Provider;
use crate::error::{FetchError, SubstError};
use crate::util::constants::{CONNECT_TIMEOUT, FETCH_TIMEOUT, KEYVAULT_DNS_SUFFIX, REDIRECT_LIMIT};
use crate::util::{RetryConfig, RetryPolicy};

/// Key Vault data-plane API version
pub const KEYVAULT_API_VERSION: &str = "7.4";

/// 3-24 chars, starts with a letter, ends with a letter or digit
static VAULT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{1,22}[A-Za-z0-9]$").expect("valid regex"));

/// Validate an Azure Key Vault name
pub fn validate_vault_name(name: &str) -> Result<(), SubstError> {
    let reason = if name.len() < 3 || name.len() > 24 {
        Some("must be 3-24 characters long")
    } else if !VAULT_NAME_RE.is_match(name) {
        Some("must start with a letter, end with a letter or digit, and contain only letters, digits and hyphens")
    } else if name.contains("--") {
        Some("must not contain consecutive hyphens")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SubstError::InvalidVaultName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// `https://<name>.vault.azure.net/` for a validated vault name
pub fn vault_url(name: &str) -> Result<String, SubstError> {
    validate_vault_name(name)?;
    Ok(format!("https://{}.{}/", name, KEYVAULT_DNS_SUFFIX))
}

/// Client settings for [`KeyVaultProvider`]
#[derive(Debug, Clone)]
pub struct KeyVaultOptions {
    /// Per-request timeout; a timeout surfaces as a fetch failure
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl Default for KeyVaultOptions {
    fn default() -> Self {
        Self {
            timeout: FETCH_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// On-demand Key Vault secret provider
pub struct KeyVaultProvider {
    client: reqwest::Client,
    vault: Url,
    credential: Arc<dyn TokenCredential>,
    token: Mutex<Option<AccessToken>>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl KeyVaultProvider {
    /// Create a provider for the vault at `vault_url`
    pub fn new(
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
        options: KeyVaultOptions,
    ) -> Result<Self, SubstError> {
        let vault = Url::parse(vault_url).map_err(|e| SubstError::ConfigError {
            reason: format!("Invalid Key Vault URL '{}': {}", vault_url, e),
        })?;
        if vault.cannot_be_a_base() {
            return Err(SubstError::ConfigError {
                reason: format!("Invalid Key Vault URL '{}'", vault_url),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(options.timeout))
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .user_agent(concat!("manifest-subst/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SubstError::HttpClient { reason: e.to_string() })?;

        tracing::debug!(vault = %vault, timeout_ms = options.timeout.as_millis() as u64, "Key Vault provider ready");

        Ok(Self {
            client,
            vault,
            credential,
            token: Mutex::new(None),
            retry: RetryPolicy::new(options.retry),
            timeout: options.timeout,
        })
    }

    /// The vault base URL
    pub fn vault(&self) -> &Url {
        &self.vault
    }

    fn secret_url(&self, name: &str) -> Url {
        let mut url = self.vault.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("secrets").push(name);
        }
        url.query_pairs_mut().append_pair("api-version", KEYVAULT_API_VERSION);
        url
    }

    async fn bearer(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.token.clone());
        }

        let fresh = self.credential.get_token(&self.client).await.map_err(|e| self.map_timeout(e))?;
        let bearer = fresh.token.clone();
        *cached = Some(fresh);
        Ok(bearer)
    }

    fn map_timeout(&self, error: FetchError) -> FetchError {
        match error {
            FetchError::Transport(e) if e.is_timeout() => FetchError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            },
            other => other,
        }
    }

    async fn fetch_once(&self, url: &Url, bearer: &str) -> Result<Option<String>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| self.map_timeout(e.into()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(env) => match (env.error.code, env.error.message) {
                    (Some(code), Some(msg)) => format!("{}: {}", code, msg),
                    (code, msg) => msg.or(code).unwrap_or_default(),
                },
                Err(_) => text.trim().to_string(),
            };
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bundle: SecretBundle = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_timeout(e.into())
            } else {
                FetchError::InvalidResponse {
                    reason: e.to_string(),
                }
            }
        })?;

        bundle.value.map(Some).ok_or_else(|| FetchError::InvalidResponse {
            reason: "secret bundle has no 'value' field".to_string(),
        })
    }
}

#[async_trait]
impl Provider for KeyVaultProvider {
    fn name(&self) -> &str {
        "keyvault"
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, FetchError> {
        let url = self.secret_url(key);
        tracing::debug!(vault = %self.vault, secret = key, "Fetching secret from Key Vault");

        self.retry
            .execute(|| async {
                let bearer = self.bearer().await?;
                self.fetch_once(&url, &bearer).await
            })
            .await
    }
}
