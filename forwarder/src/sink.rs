//! Remote sink for forwarded log entries.
//!
//! The tailing loop only depends on the [`DocumentSink`] trait. The production
//! implementation, [`DocsClient`], issues one Google Docs `batchUpdate` call per
//! batch containing a single insert-text request at a fixed document index.
//!
//! Because every batch is inserted at the same index, a later batch appears
//! above an earlier one in the document, while entries inside one batch keep
//! their file order.
//!
//! # Example
//!
//! ```no_run
//! use logdoc_forwarder::config::Config;
//! use logdoc_forwarder::entry::LogEntry;
//! use logdoc_forwarder::sink::{DocsClient, DocumentSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let mut client = DocsClient::from_config(&config)?;
//!
//!     let entry = LogEntry::parse("[2024-01-01 10:00:00] INFO: started").unwrap();
//!     client.forward(&[entry]).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::credentials::{CredentialsError, ServiceAccountKey, TokenProvider, DOCUMENTS_SCOPE};
use crate::entry::LogEntry;

/// Document index every batch is inserted at (start of the body).
pub const INSERT_INDEX: u64 = 1;

/// Errors that can occur while forwarding a batch.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Obtaining an access token failed.
    #[error("authentication error: {0}")]
    Credentials(#[from] CredentialsError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Destination for batches of parsed entries.
///
/// A call blocks the caller until the remote side has accepted or rejected
/// the whole batch.
pub trait DocumentSink {
    /// Forwards one non-empty batch, in file order.
    fn forward(
        &mut self,
        entries: &[LogEntry],
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Renders a batch as the text inserted into the document, one
/// `[<timestamp>] <level>: <message>` line per entry.
#[must_use]
pub fn render_batch(entries: &[LogEntry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&entry.to_string());
        text.push('\n');
    }
    text
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest {
    requests: Vec<Request>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    insert_text: InsertTextRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertTextRequest {
    location: Location,
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    index: u64,
}

impl BatchUpdateRequest {
    fn insert_at(index: u64, text: String) -> Self {
        Self {
            requests: vec![Request {
                insert_text: InsertTextRequest {
                    location: Location { index },
                    text,
                },
            }],
        }
    }
}

/// Settings for [`DocsClient`].
#[derive(Debug, Clone)]
pub struct DocsConfig {
    /// API base URL, e.g. `https://docs.googleapis.com`.
    pub api_url: String,

    /// Target document identifier.
    pub document_id: String,
}

/// Google Docs API client that inserts batches into one document.
#[derive(Debug)]
pub struct DocsClient {
    config: DocsConfig,
    client: Client,
    tokens: TokenProvider,
}

impl DocsClient {
    /// Creates a client authenticated as the given service account.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the private key
    /// is unusable.
    pub fn new(config: DocsConfig, key: ServiceAccountKey) -> Result<Self, SinkError> {
        let client = Client::builder().pool_max_idle_per_host(1).build()?;
        let tokens = TokenProvider::new(key, DOCUMENTS_SCOPE, client.clone())?;

        info!(
            document_id = %config.document_id,
            client_email = %tokens.client_email(),
            "Docs client initialized"
        );

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    /// Loads the credential file named by `config` and builds a client for
    /// the configured document.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential file cannot be read or parsed, or
    /// the client cannot be constructed.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let key = ServiceAccountKey::from_file(&config.credentials_file)?;
        let client = Self::new(
            DocsConfig {
                api_url: config.docs_api_url.clone(),
                document_id: config.document_id.clone(),
            },
            key,
        )?;
        Ok(client)
    }

    /// Full URL of the document's `batchUpdate` endpoint.
    #[must_use]
    pub fn batch_update_url(&self) -> String {
        format!(
            "{}/v1/documents/{}:batchUpdate",
            self.config.api_url, self.config.document_id
        )
    }

    async fn insert_text(&mut self, text: String) -> Result<(), SinkError> {
        let token = self.tokens.access_token().await?;
        let url = self.batch_update_url();
        let body = BatchUpdateRequest::insert_at(INSERT_INDEX, text);

        debug!(url = %url, "Sending batchUpdate");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("Access token rejected, discarding cached token");
            self.tokens.invalidate();
        }

        let message = response.text().await.unwrap_or_default();
        Err(SinkError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl DocumentSink for DocsClient {
    async fn forward(&mut self, entries: &[LogEntry]) -> Result<(), SinkError> {
        let text = render_batch(entries);
        self.insert_text(text).await?;
        info!(entries = entries.len(), "Entries appended to document");
        Ok(())
    }
}
