//! LibreLinkUp remote API integration
//!
//! Two collaborators for the ingestion pipeline:
//! - [`TokenCache`]: owns the persisted access credential and re-authenticates
//!   only when it is absent or expired
//! - [`LibreClient`]: fetches the graph endpoint and normalizes its payload
//!   into flat observations

use glucolog_common::{Error, Result};
use std::time::Duration;

pub mod client;
pub mod token;

pub use client::{FetchResult, LibreClient};
pub use token::TokenCache;

/// Protocol headers the LibreLinkUp API expects on every request
pub(crate) const LLU_VERSION: &str = "4.7.0";
pub(crate) const LLU_PRODUCT: &str = "llu.android";

const USER_AGENT: &str = concat!("glucolog/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Shared HTTP client construction: service user-agent and request timeout
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::Network(e.to_string()))
}
