//! Outbound HTTP port
//!
//! The request interceptor wraps this seam: it sees every outbound request
//! before the transport does and every response after. The types stay
//! deliberately small; this is a credential-injection boundary, not a
//! general HTTP client.

use async_trait::async_trait;
use thiserror::Error;

/// HTTP method for an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// The method's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// An outbound request before credential injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Headers in order of addition; names are matched case-insensitively.
    pub headers: Vec<(String, String)>,
    /// Request body, when present.
    pub body: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HttpRequest {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

    /// Creates a request with no headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body with the matching content type.
    #[must_use]
    pub fn with_json_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.set_header("Content-Type", "application/json");
        self
    }

    /// First value of the named header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the named header, or appends it when absent.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            existing.1 = value;
        } else {
            self.headers.push((name.to_string(), value));
        }
    }
}

/// A response delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the response is a 401.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Transport failures, mapped from the underlying client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpClientError {
    /// The request URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request exceeded its timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request body could not be encoded.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Port executing outbound HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes the request and returns the response, whatever its status.
    ///
    /// Non-2xx statuses are data, not errors; only transport-level failures
    /// reject.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        (**self).execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/items")
            .with_header("Authorization", "Bearer old");

        request.set_header("authorization", "Bearer new");

        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer new"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://api.example.com/items")
            .with_json_body(r#"{"name":"x"}"#);

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"x"}"#));
    }

    #[test]
    fn response_status_predicates() {
        let ok = HttpResponse {
            status: 204,
            headers: vec![],
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!ok.is_unauthorized());

        let unauthorized = HttpResponse {
            status: 401,
            headers: vec![],
            body: String::new(),
        };
        assert!(unauthorized.is_unauthorized());
    }
}
