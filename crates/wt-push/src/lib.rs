//! Client for the remote work-log service.
//!
//! Pushing is best-effort: the caller marks records as sent only after
//! [`Client::push`] returns `Ok`, so a failed push leaves local state ready
//! for a retry.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wt_core::{ExportRow, PendingPush, TrackerError};

/// Default request timeout for pushes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Push client errors.
#[derive(Debug, Error)]
pub enum PushError {
    /// No auth token was configured.
    #[error("missing push token")]
    MissingToken,
    /// The endpoint is not an http(s) URL.
    #[error("invalid push endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },
    /// The user's name or email is not configured.
    #[error("user profile incomplete: {missing} is not set")]
    IncompleteProfile { missing: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<PushError> for TrackerError {
    fn from(err: PushError) -> Self {
        Self::Remote {
            message: err.to_string(),
        }
    }
}

/// Who the pushed records belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

impl UserProfile {
    /// Builds a profile, requiring both fields to be non-blank.
    pub fn new(name: Option<&str>, email: Option<&str>) -> Result<Self, PushError> {
        let name = non_blank(name).ok_or(PushError::IncompleteProfile { missing: "user name" })?;
        let email =
            non_blank(email).ok_or(PushError::IncompleteProfile { missing: "user email" })?;
        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

/// Body of a push request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub exported_at: String,
    pub user: UserProfile,
    pub rows: Vec<ExportRow>,
}

impl PushPayload {
    pub fn new(user: UserProfile, pending: &PendingPush) -> Self {
        Self {
            exported_at: pending.exported_at.clone(),
            user,
            rows: pending.rows.clone(),
        }
    }
}

/// Remote work-log service client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for `endpoint` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank, the endpoint is not an
    /// http(s) URL, or the HTTP client fails to build.
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self, PushError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(PushError::MissingToken);
        }

        let endpoint = parse_endpoint(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(PushError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    /// POSTs `payload` to the service.
    pub async fn push(&self, payload: &PushPayload) -> Result<(), PushError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            rows = payload.rows.len(),
            "pushing records"
        );
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        tracing::info!(rows = payload.rows.len(), status = status.as_u16(), "pushed records");
        Ok(())
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, PushError> {
    let invalid = |reason| PushError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = Url::parse(endpoint.trim()).map_err(|_| invalid("not a URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid("scheme must be http or https")),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
