//! Secrets and locations loaded from environment variables.
//!
//! `.env` is loaded by the binary before this module runs, so every value here
//! may come from either the real environment or the file.

use crate::errors::{Error, Result};
use std::path::PathBuf;

/// Default location of the SQLite database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/boba_club.sqlite?mode=rwc";

/// Default location of config.toml.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Runtime settings that do not belong in config.toml.
#[derive(Debug, Clone)]
pub struct Settings {
    /// sea-orm connection URL
    pub database_url: String,
    /// Path to config.toml
    pub config_path: PathBuf,
    /// Lowercase hex SHA-256 digest of the admin password
    pub admin_password_digest: String,
    /// Optional remote endpoint that verifies the admin password
    pub admin_verify_url: Option<String>,
}

/// Reads settings from the environment.
///
/// `ADMIN_PASSWORD_SHA256` is required; `DATABASE_URL`, `BOBA_CONFIG` and
/// `ADMIN_VERIFY_URL` are optional.
///
/// # Errors
/// Returns `Error::Config` if the admin digest is missing or is not a
/// 64-character hex string.
pub fn load_settings() -> Result<Settings> {
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let config_path = std::env::var("BOBA_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let admin_password_digest = std::env::var("ADMIN_PASSWORD_SHA256").map_err(|e| Error::Config {
        message: format!("ADMIN_PASSWORD_SHA256 not set: {e}"),
    })?;
    let admin_verify_url = std::env::var("ADMIN_VERIFY_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());

    Ok(Settings {
        database_url,
        config_path,
        admin_password_digest: normalize_digest(&admin_password_digest)?,
        admin_verify_url,
    })
}

/// Lowercases and checks a hex SHA-256 digest.
///
/// # Errors
/// Returns `Error::Config` for anything that is not 32 bytes of hex.
pub fn normalize_digest(raw: &str) -> Result<String> {
    let digest = raw.trim().to_ascii_lowercase();
    match hex::decode(&digest) {
        Ok(bytes) if bytes.len() == 32 => Ok(digest),
        _ => Err(Error::Config {
            message: "ADMIN_PASSWORD_SHA256 must be a 64 character hex SHA-256 digest".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_digest_accepts_uppercase_hex() {
        let raw = "  9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08 ";
        assert_eq!(
            normalize_digest(raw).ok().as_deref(),
            Some("9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")
        );
    }

    #[test]
    fn test_normalize_digest_rejects_plaintext() {
        assert!(normalize_digest("bobaadmin123").is_err());
        assert!(normalize_digest("abcd").is_err());
    }
}
