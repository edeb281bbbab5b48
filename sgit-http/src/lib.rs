//! SGit HTTP Sync Server
//!
//! Multi-tenant endpoint: the first path segment names a repository under
//! the configured base path, the second names the action.

pub mod handlers;
pub mod registry;

pub use registry::{RepositoryRegistry, validate_repo_name};

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue,
};
use hyper::{Method, Request, Response, StatusCode};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one subdirectory per repository
    pub base_path: PathBuf,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable debug logging
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./remote-repos"),
            max_body_size: 100 * 1024 * 1024, // 100 MB
            debug: false,
        }
    }
}

/// Sync request handler
///
/// Owns the repository registry; every request is routed through it.
pub struct SyncHandler {
    config: Config,
    registry: RepositoryRegistry,
}

impl SyncHandler {
    /// Create a handler, creating the base path if it does not exist
    pub fn with_config(config: Config) -> Result<Self, HttpError> {
        std::fs::create_dir_all(&config.base_path).map_err(|e| {
            HttpError::Internal(format!(
                "Failed to create base path {:?}: {}",
                config.base_path, e
            ))
        })?;
        tracing::info!("Multi-repo server base path: {:?}", config.base_path);

        let registry = RepositoryRegistry::new(config.base_path.clone());
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// Handle an incoming HTTP request
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, HttpError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        tracing::debug!("Sync request: {} {}", parts.method, parts.uri);

        let body = if parts.method == Method::POST {
            self.read_body(body).await?
        } else {
            Bytes::new()
        };

        Ok(self.dispatch(&parts.method, parts.uri.path(), body).await)
    }

    async fn read_body<B>(&self, body: B) -> Result<Bytes, HttpError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                Err(HttpError::PayloadTooLarge(self.config.max_body_size))
            }
            Err(e) => Err(HttpError::InvalidRequest(format!(
                "Failed to read request body: {}",
                e
            ))),
        }
    }

    /// Route an already-read request
    pub async fn dispatch(&self, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
        if method == Method::OPTIONS {
            return with_cors(Response::new(Full::new(Bytes::new())));
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let response = match segments.as_slice() {
            [] => handlers::list_repositories(&self.registry).await,
            [repo, action] => match validate_repo_name(repo) {
                Err(message) => handlers::json_error(StatusCode::BAD_REQUEST, &message),
                Ok(()) => match (method.as_str(), *action) {
                    ("POST", "push") => handlers::push(&self.registry, repo, &body).await,
                    ("GET", "pull") => handlers::pull(&self.registry, repo).await,
                    ("GET", "status") => handlers::status(&self.registry, repo).await,
                    _ => handlers::json_error(StatusCode::NOT_FOUND, "Action not found"),
                },
            },
            _ => handlers::json_error(
                StatusCode::NOT_FOUND,
                "Invalid URL format. Use /{repo}/{action}",
            ),
        };

        with_cors(response)
    }
}

/// Attach permissive CORS headers
pub fn with_cors(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON `{error}` response for this error
    pub fn into_response(self) -> Response<Full<Bytes>> {
        with_cors(handlers::json_error(self.status(), &self.to_string()))
    }
}
