//! Centralized constants for sources and the Key Vault client
//!
//! All timeout, limit and naming-convention values in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Fetch Timeouts
// ═══════════════════════════════════════════════════════════════

/// Default timeout for a single remote lookup (Key Vault, token endpoints)
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the `az` CLI token fallback
pub const AZ_CLI_TIMEOUT: Duration = Duration::from_secs(20);

// ═══════════════════════════════════════════════════════════════
// HTTP Client Limits
// ═══════════════════════════════════════════════════════════════

/// Maximum number of HTTP redirects to follow
pub const REDIRECT_LIMIT: usize = 5;

/// Default number of retries for transient Key Vault failures
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Refresh access tokens this long before they expire
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════
// Naming conventions
// ═══════════════════════════════════════════════════════════════

/// Environment prefix for CI variables (`VARS_HOST` -> `vars:HOST`)
pub const VARS_PREFIX: &str = "VARS_";

/// Environment prefix for CI secrets (`SECRETS_TOKEN` -> `secrets:TOKEN`)
pub const SECRETS_PREFIX: &str = "SECRETS_";

/// OAuth scope for the Azure Key Vault data plane
pub const KEYVAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Resource identifier for managed identity and `az` token requests
pub const KEYVAULT_RESOURCE: &str = "https://vault.azure.net";

/// DNS suffix for public-cloud vaults
pub const KEYVAULT_DNS_SUFFIX: &str = "vault.azure.net";

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
