//! Azure credentials for the Key Vault provider
//!
//! Tries the ambient credential sources in order and uses the first one that
//! yields a token:
//!
//! | # | Credential | Inputs |
//! |---|------------|--------|
//! | 1 | [`StaticTokenCredential`] | `AZURE_ACCESS_TOKEN` |
//! | 2 | [`ClientSecretCredential`] | `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET` |
//! | 3 | [`ManagedIdentityCredential`] | `IDENTITY_ENDPOINT` + `IDENTITY_HEADER`, else IMDS |
//! | 4 | [`AzureCliCredential`] | `az` on `PATH`, logged in |
//!
//! Inputs come from an explicit environment snapshot, never from ambient
//! process state, so tests can build any chain they need.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::error::FetchError;
use crate::util::constants::{AZ_CLI_TIMEOUT, KEYVAULT_RESOURCE, KEYVAULT_SCOPE, TOKEN_EXPIRY_MARGIN};

/// Default Microsoft identity platform host
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Instance metadata service token endpoint
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// IMDS is link-local: if it does not answer quickly it is not there
const IMDS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// ACCESS TOKEN
// ============================================================================

/// Bearer token plus optional expiry
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, lifetime: Option<Duration>) -> Self {
        Self {
            token: token.into(),
            expires_at: lifetime.map(|d| Instant::now() + d),
        }
    }

    /// Usable for at least the expiry margin
    pub fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + TOKEN_EXPIRY_MARGIN < at,
            None => true,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Parse a token endpoint response (AAD, managed identity or `az`)
fn parse_token_response(body: &Value, source: &str) -> Result<AccessToken, FetchError> {
    let token = body
        .get("access_token")
        .or_else(|| body.get("accessToken"))
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Credential {
            reason: format!("{} response has no access token", source),
        })?;

    let lifetime = body
        .get("expires_in")
        .and_then(as_secs)
        .map(Duration::from_secs)
        .or_else(|| body.get("expires_on").and_then(as_secs).and_then(remaining_until));

    Ok(AccessToken::new(token, lifetime))
}

/// Token endpoints disagree on whether numbers are strings
fn as_secs(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_str()?.parse().ok())
}

fn remaining_until(epoch_secs: u64) -> Option<Duration> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(Duration::from_secs(epoch_secs.saturating_sub(now)))
}

async fn read_token(response: reqwest::Response, source: &str) -> Result<AccessToken, FetchError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        // throttling and outages keep their status so the caller can retry
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: format!("{} token endpoint: {}", source, body.trim()),
            });
        }
        return Err(FetchError::Credential {
            reason: format!("{} returned HTTP {}: {}", source, status.as_u16(), body.trim()),
        });
    }
    let body: Value = response.json().await.map_err(|e| FetchError::Credential {
        reason: format!("{} returned malformed JSON: {}", source, e),
    })?;
    parse_token_response(&body, source)
}

// ============================================================================
// CREDENTIAL TRAIT
// ============================================================================

/// Source of bearer tokens for the Key Vault data plane
#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &str;

    async fn get_token(&self, client: &reqwest::Client) -> Result<AccessToken, FetchError>;
}

/// Pre-issued bearer token (`AZURE_ACCESS_TOKEN`)
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &str {
        "static-token"
    }

    async fn get_token(&self, _client: &reqwest::Client) -> Result<AccessToken, FetchError> {
        Ok(AccessToken::new(self.token.clone(), None))
    }
}

/// Service principal client-credentials flow
pub struct ClientSecretCredential {
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Override the identity platform host (sovereign clouds, tests)
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into().trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, self.tenant_id)
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &str {
        "client-secret"
    }

    async fn get_token(&self, client: &reqwest::Client) -> Result<AccessToken, FetchError> {
        tracing::debug!(tenant = %self.tenant_id, client_id = %self.client_id, "Requesting token via client secret");

        let response = client
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", KEYVAULT_SCOPE),
            ])
            .send()
            .await?;

        read_token(response, self.name()).await
    }
}

/// Managed identity (App Service / Container Apps endpoint, or IMDS)
pub struct ManagedIdentityCredential {
    endpoint: String,
    identity_header: Option<String>,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// App Service / Container Apps style endpoint
    pub fn app_service(endpoint: impl Into<String>, identity_header: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity_header: Some(identity_header.into()),
            client_id: None,
        }
    }

    /// Instance metadata service (VMs, AKS with pod identity)
    pub fn imds() -> Self {
        Self {
            endpoint: IMDS_ENDPOINT.to_string(),
            identity_header: None,
            client_id: None,
        }
    }

    /// Select a user-assigned identity
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed-identity"
    }

    async fn get_token(&self, client: &reqwest::Client) -> Result<AccessToken, FetchError> {
        let mut query = vec![("resource", KEYVAULT_RESOURCE)];
        if let Some(ref client_id) = self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match self.identity_header {
            Some(ref header) => client
                .get(&self.endpoint)
                .query(&[("api-version", "2019-08-01")])
                .header("X-IDENTITY-HEADER", header),
            None => client
                .get(&self.endpoint)
                .query(&[("api-version", "2018-02-01")])
                .header("Metadata", "true")
                .timeout(IMDS_PROBE_TIMEOUT),
        };

        let response = request.query(&query).send().await?;
        read_token(response, self.name()).await
    }
}

/// Token from a logged-in Azure CLI
pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }

    /// Use a different executable (tests, wrapped installs)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &str {
        "azure-cli"
    }

    async fn get_token(&self, _client: &reqwest::Client) -> Result<AccessToken, FetchError> {
        let output = tokio::time::timeout(
            AZ_CLI_TIMEOUT,
            tokio::process::Command::new(&self.program)
                .args(["account", "get-access-token", "--resource", KEYVAULT_RESOURCE, "--output", "json"])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| FetchError::Timeout {
            timeout_ms: AZ_CLI_TIMEOUT.as_millis() as u64,
        })?
        .map_err(|e| FetchError::Credential {
            reason: format!("failed to run '{}': {}", self.program, e),
        })?;

        if !output.status.success() {
            return Err(FetchError::Credential {
                reason: format!(
                    "'{} account get-access-token' failed: {}",
                    self.program,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let body: Value = serde_json::from_slice(&output.stdout).map_err(|e| FetchError::Credential {
            reason: format!("unexpected az output: {}", e),
        })?;
        parse_token_response(&body, self.name())
    }
}

// ============================================================================
// CHAIN
// ============================================================================

/// Ordered list of credentials; the first to produce a token wins
///
/// Once every source has failed for good, the chain keeps failing with the
/// same reason without asking the sources again.
pub struct ChainedCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    exhausted: OnceCell<String>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            exhausted: OnceCell::new(),
        }
    }

    /// Build the default chain from an environment snapshot
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let var = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();
        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();

        if let Some(token) = var("AZURE_ACCESS_TOKEN") {
            sources.push(Box::new(StaticTokenCredential::new(token)));
        }

        if let (Some(tenant), Some(client_id), Some(secret)) = (
            var("AZURE_TENANT_ID"),
            var("AZURE_CLIENT_ID"),
            var("AZURE_CLIENT_SECRET"),
        ) {
            let mut credential = ClientSecretCredential::new(tenant, client_id, secret);
            if let Some(host) = var("AZURE_AUTHORITY_HOST") {
                credential = credential.with_authority_host(host);
            }
            sources.push(Box::new(credential));
        }

        let mut managed = match (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => ManagedIdentityCredential::app_service(endpoint, header),
            _ => ManagedIdentityCredential::imds(),
        };
        if let Some(client_id) = var("AZURE_CLIENT_ID") {
            managed = managed.with_client_id(client_id);
        }
        sources.push(Box::new(managed));

        sources.push(Box::new(AzureCliCredential::new()));

        Self::new(sources)
    }

    /// Names of the chained credentials, in order
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &str {
        "chained"
    }

    async fn get_token(&self, client: &reqwest::Client) -> Result<AccessToken, FetchError> {
        if let Some(reason) = self.exhausted.get() {
            return Err(FetchError::Credential { reason: reason.clone() });
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        let mut throttled = None;

        for source in &self.sources {
            match source.get_token(client).await {
                Ok(token) => {
                    tracing::debug!(credential = source.name(), "Acquired Key Vault access token");
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!(credential = source.name(), error = %e, "Credential unavailable");
                    failures.push(format!("{}: {}", source.name(), e));
                    // an unreachable probe (IMDS, az) means "not here"; a 429/5xx
                    // from a token endpoint that answered is worth retrying
                    if throttled.is_none() && matches!(e, FetchError::Http { .. }) && e.is_transient() {
                        throttled = Some(e);
                    }
                }
            }
        }

        if let Some(e) = throttled {
            return Err(e);
        }

        let reason = if failures.is_empty() {
            "no credential sources configured".to_string()
        } else {
            failures.join("; ")
        };
        tracing::warn!(reason = %reason, "No Key Vault credential available");
        let _ = self.exhausted.set(reason.clone());
        Err(FetchError::Credential { reason })
    }
}
