//! HTTP transport for the nadi shipper.
//!
//! [`HttpTransport`] POSTs a JSON body to `<endpoint>/<name>` with the
//! shipper's authentication headers and a fresh attempt identifier, and
//! classifies the response. Retrying is left to the caller.
//!
//! # Example
//!
//! ```ignore
//! use nadi_transport::{HttpTransport, Transport};
//! use nadi_types::Endpoint;
//!
//! let transport = HttpTransport::from_config(&config)?;
//! let reply = transport.send(Endpoint::Record, Some(br#"{"event":"boot"}"#))?;
//! println!("delivered with status {}", reply.status);
//! ```

use std::time::Duration;

use nadi_config::ShipperConfig;
use nadi_types::Endpoint;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;

pub mod ident;

pub use ident::{ATTEMPT_ID_LEN, attempt_id};

/// Header carrying the secondary application token
pub const TOKEN_HEADER: &str = "Nadi-Token";

/// Header carrying the per-attempt identifier
pub const ATTEMPT_ID_HEADER: &str = "Nadi-Transporter-Id";

/// Default user agent for API requests
pub const USER_AGENT: &str = concat!("nadi-shipper/", env!("CARGO_PKG_VERSION"));

/// Errors from a single request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The body handed to the client is not JSON; nothing was sent.
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Timeout, refused connection, DNS failure and friends.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with something other than 200/201.
    #[error("API request failed with status code {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl TransportError {
    /// Most useful human-readable reason: the server's own message when it
    /// sent one, otherwise the full error text.
    pub fn message(&self) -> String {
        match self {
            TransportError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    /// `message` field of the body, if it is a JSON object carrying one
    pub message: Option<String>,
}

/// Anything that can deliver a JSON body to a named endpoint.
pub trait Transport {
    fn send(&self, endpoint: Endpoint, payload: Option<&[u8]>) -> Result<Reply, TransportError>;
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

fn body_message(body: &str) -> Option<String> {
    serde_json::from_str::<MessageBody>(body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

/// Diagnostic for a rejected request: the server's structured message when
/// present, the raw status and body otherwise.
pub fn rejection_message(status: u16, body: &str) -> String {
    if let Some(message) = body_message(body) {
        return message;
    }

    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}

/// Reject payloads that are not JSON before any network I/O.
pub fn validate_payload(payload: &[u8]) -> Result<(), TransportError> {
    serde_json::from_slice::<serde::de::IgnoredAny>(payload)
        .map(|_| ())
        .map_err(TransportError::InvalidPayload)
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    api_key: String,
    token: String,
    accept: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        api_key: &str,
        token: &str,
        accept: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            token: token.to_string(),
            accept: accept.to_string(),
            http,
        })
    }

    pub fn from_config(config: &ShipperConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.endpoint,
            &config.api_key,
            &config.token,
            &config.accept,
            config.timeout,
        )
    }

    /// Full URL for an endpoint.
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.as_str())
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, endpoint: Endpoint, payload: Option<&[u8]>) -> Result<Reply, TransportError> {
        if let Some(body) = payload {
            validate_payload(body)?;
        }

        let url = self.url(endpoint);
        let mut request = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, &self.accept)
            .header(CONTENT_TYPE, "application/json")
            .header(TOKEN_HEADER, &self.token)
            .header(ATTEMPT_ID_HEADER, attempt_id());
        if let Some(body) = payload {
            request = request.body(body.to_vec());
        }

        let response = request.send().map_err(|source| TransportError::Request {
            url: url.clone(),
            source,
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|source| TransportError::Request { url, source })?;

        if status == 200 || status == 201 {
            Ok(Reply {
                status,
                message: body_message(&body),
                body,
            })
        } else {
            Err(TransportError::Rejected {
                status,
                message: rejection_message(status, &body),
            })
        }
    }
}
