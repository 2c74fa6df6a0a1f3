//! Admin credential verification.
//!
//! The local check compares a SHA-256 digest of the submitted secret with the
//! configured digest. An optional remote endpoint takes precedence when it is
//! reachable.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

/// Checks a submitted secret.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// True if `secret` is the admin credential.
    ///
    /// # Errors
    /// `Error::Connectivity` when the verifier cannot give an answer.
    async fn verify(&self, secret: &str) -> Result<bool>;
}

/// Lowercase hex SHA-256 of `input`.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Local digest comparison.
#[derive(Debug, Clone)]
pub struct DigestVerifier {
    digest: String,
}

impl DigestVerifier {
    /// Verifier for an already-normalized lowercase hex digest.
    #[must_use]
    pub const fn new(digest: String) -> Self {
        Self { digest }
    }

    /// Verifier for a plaintext secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::new(sha256_hex(secret))
    }
}

#[async_trait]
impl CredentialVerifier for DigestVerifier {
    async fn verify(&self, secret: &str) -> Result<bool> {
        Ok(constant_time_eq(
            sha256_hex(secret).as_bytes(),
            self.digest.as_bytes(),
        ))
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
}

fn connectivity(message: impl Into<String>) -> Error {
    Error::Connectivity {
        message: message.into(),
    }
}

/// Remote verification endpoint: `POST {"password": ...}` answered with
/// `{"valid": bool}`.
#[derive(Debug, Clone)]
pub struct RemoteVerifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RemoteVerifier {
    /// Verifier posting to `url`, giving up after `timeout`.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CredentialVerifier for RemoteVerifier {
    async fn verify(&self, secret: &str) -> Result<bool> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&VerifyRequest { password: secret })
            .send()
            .await
            .map_err(|e| connectivity(format!("verification request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(connectivity(format!(
                "verification endpoint answered {status}"
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| connectivity(format!("unreadable verification response: {e}")))?;
        debug!("Remote verification answered");
        Ok(body.valid)
    }
}

/// Remote first, local when the remote cannot answer.
pub struct FallbackVerifier {
    remote: Option<Box<dyn CredentialVerifier>>,
    local: Box<dyn CredentialVerifier>,
}

impl FallbackVerifier {
    /// Combines an optional remote verifier with a local one.
    #[must_use]
    pub fn new(
        remote: Option<Box<dyn CredentialVerifier>>,
        local: Box<dyn CredentialVerifier>,
    ) -> Self {
        Self { remote, local }
    }
}

#[async_trait]
impl CredentialVerifier for FallbackVerifier {
    async fn verify(&self, secret: &str) -> Result<bool> {
        if let Some(remote) = &self.remote {
            match remote.verify(secret).await {
                Ok(valid) => return Ok(valid),
                Err(err @ Error::Connectivity { .. }) => {
                    warn!("Remote verification unavailable, checking locally: {}", err);
                }
                Err(err) => return Err(err),
            }
        }
        self.local.verify(secret).await
    }
}
