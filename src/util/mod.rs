//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts, limits and naming conventions
//! - `retry`: Exponential backoff for transient fetch failures

pub mod constants;
pub mod retry;

// Re-export public types
pub use constants::{CONNECT_TIMEOUT, FETCH_TIMEOUT, REDIRECT_LIMIT};
pub use retry::{RetryConfig, RetryPolicy};
