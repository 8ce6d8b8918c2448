//! Google service-account authentication for the Docs sink.
//!
//! The credential file is the JSON key downloaded for a service account. It
//! is read once at startup. Access tokens are obtained with the OAuth2
//! JWT-bearer flow: an RS256-signed assertion is posted to the key's
//! `token_uri` and the returned access token is cached until shortly before
//! it expires.
//!
//! # Example
//!
//! ```no_run
//! use logdoc_forwarder::credentials::{ServiceAccountKey, TokenProvider, DOCUMENTS_SCOPE};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = ServiceAccountKey::from_file(Path::new("creds.json"))?;
//!     let mut tokens = TokenProvider::new(key, DOCUMENTS_SCOPE, reqwest::Client::new())?;
//!     let token = tokens.access_token().await?;
//!     println!("token length: {}", token.len());
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// OAuth2 scope granting read/write access to Google Docs.
pub const DOCUMENTS_SCOPE: &str = "https://www.googleapis.com/auth/documents";

/// Token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Grant type for the JWT-bearer flow (RFC 7523).
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of a signed assertion. Google rejects anything above one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are refreshed this long before they expire.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Assumed token lifetime when the endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Errors that can occur while loading credentials or obtaining tokens.
#[derive(Error, Debug)]
pub enum CredentialsError {
    /// The credential file could not be read.
    #[error("unable to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential file is not a valid service-account key.
    #[error("unable to parse credentials: {0}")]
    Parse(#[from] serde_json::Error),

    /// The private key is not a usable RSA PEM key.
    #[error("invalid private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    /// Signing the token assertion failed.
    #[error("failed to sign token assertion: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    /// The token request could not be sent or its response decoded.
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint rejected request: {status} - {message}")]
    TokenRejected { status: u16, message: String },
}

/// A Google service-account JSON key.
///
/// Only the fields needed for the JWT-bearer flow are kept; everything else in
/// the file is ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account identity, used as the assertion issuer.
    pub client_email: String,

    /// PEM-encoded RSA private key.
    pub private_key: String,

    /// Key identifier, sent as the JWT `kid` header when present.
    #[serde(default)]
    pub private_key_id: Option<String>,

    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Reads and parses a key file.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Read`] if the file cannot be read and
    /// [`CredentialsError::Parse`] if it is not a service-account key.
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let contents = fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parses a key from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Parse`] on malformed JSON or missing fields.
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Claims of the signed assertion.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Issues and caches OAuth2 access tokens for a service account.
pub struct TokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    client: Client,
    cached: Option<CachedToken>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("client_email", &self.key.client_email)
            .field("scope", &self.scope)
            .field("cached", &self.cached.is_some())
            .finish()
    }
}

impl TokenProvider {
    /// Creates a provider for `scope`, validating the private key up front.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::InvalidKey`] if the key is not an RSA PEM key.
    pub fn new(
        key: ServiceAccountKey,
        scope: &str,
        client: Client,
    ) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(CredentialsError::InvalidKey)?;

        Ok(Self {
            key,
            encoding_key,
            scope: scope.to_string(),
            client,
            cached: None,
        })
    }

    /// Service account the tokens are issued for.
    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Returns a valid access token, requesting a new one when the cached
    /// token is missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails, the request fails, or the token
    /// endpoint answers with a non-success status.
    pub async fn access_token(&mut self) -> Result<String, CredentialsError> {
        let now = Utc::now();

        if let Some(cached) = &self.cached {
            if now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let assertion = self.assertion(now)?;

        debug!(token_uri = %self.key.token_uri, "Requesting access token");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CredentialsError::TokenRejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        info!(
            client_email = %self.key.client_email,
            expires_in = lifetime,
            "Obtained access token"
        );

        self.cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + ChronoDuration::seconds(lifetime),
        });

        Ok(token.access_token)
    }

    /// Drops the cached token so the next call requests a fresh one.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Builds the signed JWT assertion for the token request.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialsError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(CredentialsError::Sign)
    }
}
