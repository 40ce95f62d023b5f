//! LibreLinkUp access token cache
//!
//! Exactly one live credential exists at a time: it is loaded from the
//! persisted token file while `now < expiry` and renewed against the auth
//! endpoint otherwise. Every successful re-authentication overwrites the
//! token file.

use super::{LLU_PRODUCT, LLU_VERSION};
use glucolog_common::config::LibreConfig;
use glucolog_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Fallback lifetime when the auth response omits an explicit expiry
const TOKEN_FALLBACK_TTL_SECS: i64 = 24 * 60 * 60;

/// Persisted credential record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    pub expiry: i64,
}

/// Owns the access credential and its persistence
pub struct TokenCache {
    http: reqwest::Client,
    host: String,
    email: String,
    password: String,
    token_path: PathBuf,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

// The remote payload is loosely typed; every field is optional and absence
// is decided here, not by serde errors.
#[derive(Deserialize)]
struct LoginResponse {
    data: Option<LoginData>,
}

#[derive(Deserialize)]
struct LoginData {
    #[serde(rename = "authTicket")]
    auth_ticket: Option<AuthTicket>,
}

#[derive(Deserialize)]
struct AuthTicket {
    token: Option<String>,
    expires: Option<i64>,
}

impl TokenCache {
    pub fn new(config: &LibreConfig, token_path: PathBuf) -> Result<Self> {
        Ok(Self {
            http: super::http_client()?,
            host: config.host.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
            token_path,
        })
    }

    /// Return a valid access token, re-authenticating only when the cached
    /// credential is absent or expired
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.load_cached() {
            debug!("Using cached LibreLinkUp token");
            return Ok(token);
        }
        self.authenticate().await
    }

    /// Load the persisted credential; absent, expired, or unreadable all
    /// count as "no cached token"
    fn load_cached(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.token_path).ok()?;
        let credential: StoredCredential = match serde_json::from_str(&contents) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(
                    "Ignoring unreadable token file {}: {}",
                    self.token_path.display(),
                    e
                );
                return None;
            }
        };
        if time::now_epoch() >= credential.expiry {
            debug!("Cached LibreLinkUp token expired");
            return None;
        }
        Some(credential.access_token)
    }

    fn save(&self, credential: &StoredCredential) -> Result<()> {
        let contents = serde_json::to_string(credential)
            .map_err(|e| Error::Internal(format!("failed to serialize credential: {e}")))?;
        std::fs::write(&self.token_path, contents)?;
        Ok(())
    }

    async fn authenticate(&self) -> Result<String> {
        let url = format!("{}/auth/login", self.host);
        let response = self
            .http
            .post(&url)
            .header("version", LLU_VERSION)
            .header("product", LLU_PRODUCT)
            .json(&LoginRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::Network(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Authentication(format!(
                "login rejected with status {status}"
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("malformed login response: {e}")))?;

        let ticket = body.data.and_then(|d| d.auth_ticket);
        let token = ticket
            .as_ref()
            .and_then(|t| t.token.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication("login response missing token".to_string()))?;
        let expiry = ticket
            .and_then(|t| t.expires)
            .filter(|expires| *expires > 0)
            .unwrap_or_else(|| time::now_epoch() + TOKEN_FALLBACK_TTL_SECS);

        self.save(&StoredCredential {
            access_token: token.clone(),
            expiry,
        })?;
        info!("Authenticated with LibreLinkUp, token valid until epoch {expiry}");

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_at(token_path: PathBuf) -> TokenCache {
        // Closed port: any accidental network call fails fast
        let config = LibreConfig {
            host: "http://127.0.0.1:9".to_string(),
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
            patient_id: "abc-123".to_string(),
        };
        TokenCache::new(&config, token_path).unwrap()
    }

    fn write_credential(path: &PathBuf, token: &str, expiry: i64) {
        let credential = StoredCredential {
            access_token: token.to_string(),
            expiry,
        };
        std::fs::write(path, serde_json::to_string(&credential).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_credential(&path, "cached-token", time::now_epoch() + 3600);

        // The configured host is unreachable, so success proves no network
        // authentication happened
        let token = cache_at(path).get_token().await.unwrap();
        assert_eq!(token, "cached-token");
    }

    #[tokio::test]
    async fn test_expired_token_triggers_reauthentication() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_credential(&path, "stale-token", time::now_epoch() - 1);

        // Expired credential forces the auth call, which fails against the
        // unreachable host
        let err = cache_at(path).get_token().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_files_are_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();

        let missing = cache_at(dir.path().join("nope.json"));
        assert!(missing.load_cached().is_none());

        let corrupt_path = dir.path().join("token.json");
        std::fs::write(&corrupt_path, "not json at all").unwrap();
        let corrupt = cache_at(corrupt_path);
        assert!(corrupt.load_cached().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_credential() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let cache = cache_at(path.clone());

        cache
            .save(&StoredCredential {
                access_token: "first".to_string(),
                expiry: time::now_epoch() + 100,
            })
            .unwrap();
        cache
            .save(&StoredCredential {
                access_token: "second".to_string(),
                expiry: time::now_epoch() + 200,
            })
            .unwrap();

        assert_eq!(cache.load_cached().unwrap(), "second");
    }
}
