//! HTTP client for an sgit sync server.
//!
//! Every call addresses `<base>/{repo}/{action}` except the repository list,
//! which is `GET <base>/`. A 404 from pull or status means the remote has
//! nothing to offer and comes back as `Ok(None)`.

use reqwest::{StatusCode, Url};
use sgit_core::{ErrorBody, PushResponse, RemoteStatus, RepositoryList, SyncPayload};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client-side sync failures
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Invalid remote URL '{0}'")]
    InvalidUrl(String),

    #[error("Failed to connect to {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },

    #[error("Unexpected response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// HTTP sync client bound to one server.
pub struct RemoteClient {
    base_url: Url,
    http: reqwest::Client,
}

impl RemoteClient {
    /// Create a client for `base_url` (e.g. `http://localhost:3003`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let parsed =
            Url::parse(base_url).map_err(|_| RemoteError::InvalidUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| RemoteError::Network {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            base_url: parsed,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST /{repo}/push
    pub async fn push(&self, repo: &str, payload: &SyncPayload) -> Result<PushResponse, RemoteError> {
        let url = self.endpoint(&[repo, "push"])?;
        let body = serde_json::to_vec(payload).map_err(RemoteError::Encode)?;

        let resp = self
            .http
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| network(&url, source))?;
        let (status, text) = read_response(&url, resp).await?;
        if !status.is_success() {
            return Err(status_error(&url, status, &text));
        }

        // Servers that answer with plain text still accepted the push
        Ok(serde_json::from_str(&text).unwrap_or(PushResponse {
            success: true,
            message: text,
            commit: None,
        }))
    }

    /// GET /{repo}/pull
    pub async fn pull(&self, repo: &str) -> Result<Option<SyncPayload>, RemoteError> {
        let url = self.endpoint(&[repo, "pull"])?;
        self.get_optional(url).await
    }

    /// GET /{repo}/status
    pub async fn status(&self, repo: &str) -> Result<Option<RemoteStatus>, RemoteError> {
        let url = self.endpoint(&[repo, "status"])?;
        self.get_optional(url).await
    }

    /// GET /
    pub async fn list_repositories(&self) -> Result<RepositoryList, RemoteError> {
        let url = self.endpoint(&[])?;
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| network(&url, source))?;
        let (status, text) = read_response(&url, resp).await?;
        if !status.is_success() {
            return Err(status_error(&url, status, &text));
        }
        parse(&url, &text)
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, RemoteError> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| network(&url, source))?;
        let (status, text) = read_response(&url, resp).await?;
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} has nothing: {}", url, text);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(&url, status, &text));
        }
        parse(&url, &text).map(Some)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        if segments.is_empty() {
            return Ok(url);
        }
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn network(url: &Url, source: reqwest::Error) -> RemoteError {
    RemoteError::Network {
        url: url.to_string(),
        source,
    }
}

async fn read_response(
    url: &Url,
    resp: reqwest::Response,
) -> Result<(StatusCode, String), RemoteError> {
    let status = resp.status();
    let text = resp.text().await.map_err(|source| network(url, source))?;
    Ok((status, text))
}

/// Prefer the server's `{error}` message over the raw body
fn status_error(url: &Url, status: StatusCode, text: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorBody>(text)
        .map(|body| body.error)
        .unwrap_or_else(|_| text.to_string());
    RemoteError::Status {
        url: url.to_string(),
        status,
        message,
    }
}

fn parse<T: DeserializeOwned>(url: &Url, text: &str) -> Result<T, RemoteError> {
    serde_json::from_str(text).map_err(|e| RemoteError::MalformedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
