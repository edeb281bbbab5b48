//! HTTP endpoint handlers for whole-repository sync.
//!
//! Endpoints:
//!   GET  /                → names of repositories under the base path
//!   POST /{repo}/push     → import a full snapshot, creating the repository
//!   GET  /{repo}/pull     → export the current snapshot (404 when empty)
//!   GET  /{repo}/status   → head, file count, branch

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use sgit_core::object::now_iso8601;
use sgit_core::{ErrorBody, PushResponse, RemoteStatus, RepositoryError, RepositoryList, SyncPayload};

use crate::registry::RepositoryRegistry;

// ─────────────────────────────────────────────────────
// GET /
// ─────────────────────────────────────────────────────

pub async fn list_repositories(registry: &RepositoryRegistry) -> Response<Full<Bytes>> {
    match registry.list_on_disk() {
        Ok(names) => json_ok(&RepositoryList::new(names)),
        Err(e) => {
            tracing::error!("List repositories error: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────
// POST /{repo}/push
// ─────────────────────────────────────────────────────

pub async fn push(registry: &RepositoryRegistry, name: &str, body: &[u8]) -> Response<Full<Bytes>> {
    let payload = match SyncPayload::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Rejected push to {}: {}", name, e);
            return json_error(StatusCode::BAD_REQUEST, &format!("Invalid push data: {}", e));
        }
    };

    let repo = match registry.get_or_create(name).await {
        Ok(repo) => repo,
        Err(e) => return internal_error("Push", &e),
    };

    let file_count = payload.file_count();
    match blocking(move || repo.import(&payload)).await {
        Ok(id) => {
            tracing::info!(
                "Received push to {}: {} ({} files)",
                name,
                id.short(),
                file_count
            );
            json_ok(&PushResponse {
                success: true,
                message: "Push successful".to_string(),
                commit: Some(id.to_hex()),
            })
        }
        Err(e @ RepositoryError::InvalidPayload(_)) => {
            tracing::warn!("Rejected push to {}: {}", name, e);
            json_error(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => internal_error("Push", &e),
    }
}

// ─────────────────────────────────────────────────────
// GET /{repo}/pull
// ─────────────────────────────────────────────────────

pub async fn pull(registry: &RepositoryRegistry, name: &str) -> Response<Full<Bytes>> {
    let repo = match registry.get_or_create(name).await {
        Ok(repo) => repo,
        Err(e) => return internal_error("Pull", &e),
    };

    let exported = blocking(move || match repo.head()? {
        Some(_) => repo.export().map(Some),
        None => Ok(None),
    })
    .await;

    match exported {
        Ok(None) => json_error(StatusCode::NOT_FOUND, "No commits available"),
        Ok(Some(payload)) => {
            if let Some(head) = payload.head {
                tracing::info!("Served pull request for {}: {}", name, head.short());
            }
            json_ok(&payload)
        }
        Err(e) => internal_error("Pull", &e),
    }
}

// ─────────────────────────────────────────────────────
// GET /{repo}/status
// ─────────────────────────────────────────────────────

pub async fn status(registry: &RepositoryRegistry, name: &str) -> Response<Full<Bytes>> {
    let repo = match registry.get_or_create(name).await {
        Ok(repo) => repo,
        Err(e) => return internal_error("Status", &e),
    };

    let result = blocking(move || {
        let status = repo.status()?;
        Ok((status, repo.head()?))
    })
    .await;
    match result {
        Ok((status, head)) => json_ok(&RemoteStatus {
            repository: name.to_string(),
            commit: head.map(|id| id.short()),
            files: status.files,
            last_update: head.map(|_| now_iso8601()),
            branch: status.branch,
        }),
        Err(e) => internal_error("Status", &e),
    }
}

// ─────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────

/// Run repository I/O on the blocking pool
async fn blocking<T, F>(op: F) -> Result<T, RepositoryError>
where
    F: FnOnce() -> Result<T, RepositoryError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| RepositoryError::from(std::io::Error::other(e)))?
}

fn internal_error(operation: &str, e: &RepositoryError) -> Response<Full<Bytes>> {
    tracing::error!("{} error: {}", operation, e);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn json_ok<T: serde::Serialize>(data: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(data) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

pub fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&ErrorBody {
        error: message.to_string(),
    })
    .unwrap_or_default();
    json_response(status, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_json_error_shape() {
        let resp = json_error(StatusCode::NOT_FOUND, "nope");
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let parsed: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.error, "nope");
    }

    #[tokio::test]
    async fn test_json_ok_shape() {
        let resp = json_ok(&RepositoryList::new(vec!["a".into()]));
        assert_eq!(resp.status(), 200);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let parsed: RepositoryList = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.count, 1);
    }
}
