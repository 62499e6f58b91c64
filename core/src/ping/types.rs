//! Core types and traits for probing

use super::PingError;
use async_trait::async_trait;
use schema::{PingDestination, PingStatus};

/// HTTP methods a probe may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// HEAD request, no response body
    Head,
    /// POST request with an empty body
    Post,
}

impl HttpMethod {
    /// Parse a destination's method name, ignoring ASCII case and surrounding whitespace
    pub fn parse(method: &str) -> Result<Self, PingError> {
        let method = method.trim();
        if method.eq_ignore_ascii_case("GET") {
            Ok(HttpMethod::Get)
        } else if method.eq_ignore_ascii_case("HEAD") {
            Ok(HttpMethod::Head)
        } else if method.eq_ignore_ascii_case("POST") {
            Ok(HttpMethod::Post)
        } else {
            Err(PingError::UnsupportedMethod(method.to_string()))
        }
    }

    /// Canonical method name
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Trait for probe implementations
///
/// A pinger never fails: timeouts, transport errors and unusable
/// destinations are all reported through the returned [`PingStatus`].
/// Implementations must be shareable across the manager's probe tasks.
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Probe one destination
    async fn ping(&self, destination: &PingDestination) -> PingStatus;
}
