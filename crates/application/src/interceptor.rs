//! Bearer-token request interceptor
//!
//! Wraps the HTTP transport: refreshes ahead of sending when the token has
//! expired, attaches the bearer header, and replays a 401-rejected request
//! exactly once with a freshly refreshed token. A second rejection ends
//! the session.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use warden_domain::AuthError;

use crate::ports::{HttpClientError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::service::AuthService;

/// Failures surfaced by the authenticated client.
#[derive(Debug, Error)]
pub enum RequestError {
    /// An authentication operation failed while preparing or replaying.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The transport failed.
    #[error(transparent)]
    Http(#[from] HttpClientError),

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Body(String),

    /// The request was replayed once after a refresh and was still
    /// rejected.
    #[error("request rejected with 401 after token refresh")]
    Unauthorized,
}

/// HTTP client wrapper that injects bearer credentials.
pub struct AuthHttpClient<T> {
    transport: T,
    service: Arc<AuthService>,
}

impl<T: HttpTransport> AuthHttpClient<T> {
    /// Creates the wrapper around a transport and the auth facade.
    #[must_use]
    pub const fn new(transport: T, service: Arc<AuthService>) -> Self {
        Self { transport, service }
    }

    /// Executes a request with credential injection and the one-shot
    /// refresh-and-replay policy.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Http`] on transport failure,
    /// [`RequestError::Auth`] when the replay's refresh is rejected, and
    /// [`RequestError::Unauthorized`] when the replayed request is rejected
    /// again.
    pub async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, RequestError> {
        if self.service.snapshot().is_authenticated {
            if self.service.token_expired() {
                // The session may have been force-ended here; the request
                // still goes out and the server gets to judge it.
                if let Err(error) = self.service.update_token().await {
                    warn!(%error, "token refresh failed before request");
                }
            }
            if let Some(token) = self.service.get_token() {
                request.set_header("Authorization", format!("Bearer {token}"));
            }
        }

        let response = self.transport.execute(request.clone()).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        // One-shot refresh and replay. A rejected refresh already forced a
        // logout inside the provider; it only propagates from here.
        let token = self.service.update_token().await?;
        request.set_header("Authorization", format!("Bearer {token}"));

        let replayed = self.transport.execute(request).await?;
        if replayed.is_unauthorized() {
            if let Err(error) = self.service.logout().await {
                warn!(%error, "logout after rejected replay failed");
            }
            return Err(RequestError::Unauthorized);
        }
        Ok(replayed)
    }

    /// GET with JSON accept headers.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn get(&self, url: impl Into<String>) -> Result<HttpResponse, RequestError> {
        self.execute(Self::json_request(HttpMethod::Get, url.into()))
            .await
    }

    /// POST with a JSON-encoded body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); additionally
    /// [`RequestError::Body`] when the payload cannot be encoded.
    pub async fn post<B: Serialize + Sync>(
        &self,
        url: impl Into<String>,
        body: &B,
    ) -> Result<HttpResponse, RequestError> {
        let payload =
            serde_json::to_string(body).map_err(|e| RequestError::Body(e.to_string()))?;
        self.execute(Self::json_request(HttpMethod::Post, url.into()).with_json_body(payload))
            .await
    }

    /// PUT with a JSON-encoded body.
    ///
    /// # Errors
    ///
    /// See [`post`](Self::post).
    pub async fn put<B: Serialize + Sync>(
        &self,
        url: impl Into<String>,
        body: &B,
    ) -> Result<HttpResponse, RequestError> {
        let payload =
            serde_json::to_string(body).map_err(|e| RequestError::Body(e.to_string()))?;
        self.execute(Self::json_request(HttpMethod::Put, url.into()).with_json_body(payload))
            .await
    }

    /// DELETE with JSON accept headers.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn delete(&self, url: impl Into<String>) -> Result<HttpResponse, RequestError> {
        self.execute(Self::json_request(HttpMethod::Delete, url.into()))
            .await
    }

    fn json_request(method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url).with_header("Accept", "application/json")
    }
}
