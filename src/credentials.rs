//! Service-account credential bootstrap.
//!
//! The preferred source is a base64-encoded service-account JSON blob taken
//! from the environment; a plain JSON file on disk is still accepted. Either
//! way the result is decoded once at startup and kept in the app state.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CREDENTIALS_ENV: &str = "FIREBASE_CREDENTIALS_BASE64";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials: set FIREBASE_CREDENTIALS_BASE64 or pass --credentials-file")]
    Missing,
    #[error("credentials are not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded credentials are not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("credentials are not valid service-account JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid service account: {0}")]
    Invalid(String),
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    pub client_email: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("account_type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Base64(String),
    File(PathBuf),
}

impl CredentialSource {
    /// The environment blob wins over a file path. Blank values count as absent.
    pub fn resolve(
        base64_blob: Option<&str>,
        file: Option<&Path>,
    ) -> Result<CredentialSource, CredentialError> {
        if let Some(blob) = base64_blob.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(CredentialSource::Base64(blob.to_string()));
        }
        if let Some(path) = file.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(CredentialSource::File(path.to_path_buf()));
        }
        Err(CredentialError::Missing)
    }

    pub fn load(&self) -> Result<ServiceAccount, CredentialError> {
        match self {
            CredentialSource::Base64(blob) => decode_base64(blob),
            CredentialSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|source| CredentialError::Io {
                    path: path.to_string_lossy().to_string(),
                    source,
                })?;
                parse_json(&String::from_utf8(bytes)?)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Base64(_) => format!("env {}", CREDENTIALS_ENV),
            CredentialSource::File(p) => format!("file {}", p.display()),
        }
    }
}

pub fn decode_base64(blob: &str) -> Result<ServiceAccount, CredentialError> {
    let bytes = STANDARD.decode(blob.trim())?;
    parse_json(&String::from_utf8(bytes)?)
}

fn parse_json(text: &str) -> Result<ServiceAccount, CredentialError> {
    let sa: ServiceAccount = serde_json::from_str(text)?;
    if sa.account_type != "service_account" {
        return Err(CredentialError::Invalid(format!(
            "type must be service_account, got {:?}",
            sa.account_type
        )));
    }
    if sa.project_id.trim().is_empty() {
        return Err(CredentialError::Invalid("project_id is empty".into()));
    }
    if sa.client_email.trim().is_empty() {
        return Err(CredentialError::Invalid("client_email is empty".into()));
    }
    Ok(sa)
}
