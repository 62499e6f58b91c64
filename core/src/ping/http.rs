//! HTTP probing

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use schema::{epoch_millis, PingDestination, PingStatus, PingerConfig};
use std::time::{Duration, Instant, SystemTime};
use tokio::time::timeout;
use tracing::debug;

use super::{HttpMethod, PingError, Pinger};
use crate::traits::extract_traits;

/// Maximum number of redirects followed before the last response is reported
pub const MAX_REDIRECTS: usize = 10;

/// User-Agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("pinger/", env!("CARGO_PKG_VERSION"));

/// HTTP pinger issuing GET, HEAD or POST requests
///
/// One pinger holds one connection-pooling client and is shared by all
/// probe tasks. TLS uses rustls with the webpki root store; certificates
/// are always validated.
///
/// # Example
///
/// ```rust,no_run
/// use pinger_core::ping::{HttpPinger, Pinger};
/// use schema::PingDestination;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pinger = HttpPinger::new(Duration::from_secs(5))?;
/// let destination = PingDestination::new(
///     "tenant", "test", "res-1", "https://hawkular.github.io", "HEAD",
/// );
///
/// let status = pinger.ping(&destination).await;
/// println!("{} answered {} in {} ms", destination, status.code, status.duration_millis);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpPinger {
    client: Client,
    timeout: Duration,
}

impl HttpPinger {
    /// Create a pinger with the default User-Agent
    ///
    /// `timeout` bounds connection establishment and the whole request.
    pub fn new(timeout: Duration) -> Result<Self, PingError> {
        Self::with_user_agent(timeout, DEFAULT_USER_AGENT)
    }

    /// Create a pinger sending the given User-Agent
    pub fn with_user_agent(timeout: Duration, user_agent: &str) -> Result<Self, PingError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Create a pinger from the service configuration
    pub fn from_config(config: &PingerConfig) -> Result<Self, PingError> {
        Self::with_user_agent(config.timeout(), &config.user_agent)
    }

    /// Get the probe timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, destination: &PingDestination) -> Result<Response, PingError> {
        let method = HttpMethod::parse(&destination.http_method)?;
        let url = Url::parse(&destination.url)
            .map_err(|e| PingError::InvalidUrl(format!("{}: {}", destination.url, e)))?;

        let mut request = self.client.request(method.into(), url);
        if method == HttpMethod::Post {
            request = request.body(Vec::<u8>::new());
        }

        match timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(PingError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(PingError::Transport(e)),
            Err(_elapsed) => Err(PingError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Pinger for HttpPinger {
    async fn ping(&self, destination: &PingDestination) -> PingStatus {
        debug!("Pinging {}", destination);

        let timestamp = epoch_millis(SystemTime::now());
        let started = Instant::now();
        let outcome = self.send(destination).await;
        let duration = started.elapsed();

        match outcome {
            Ok(response) => {
                let code = response.status().as_u16();
                let traits = extract_traits(response.headers());
                debug!("Ping to {} returned {} in {:?}", destination, code, duration);
                // Dropping the response without reading the body releases the connection
                PingStatus::response(destination.clone(), code, duration, timestamp, traits)
            }
            Err(e) => {
                debug!("Ping to {} failed after {:?}: {}", destination, duration, e);
                e.into_status(destination.clone(), duration, timestamp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Method, Request, Server};
    use schema::{TIMEOUT_CODE, TRANSPORT_FAILURE_CODE, UNSUPPORTED_METHOD_CODE};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::task;

    async fn route(req: Request<Body>) -> hyper::Response<Body> {
        match req.uri().path() {
            "/ok" => hyper::Response::builder()
                .status(200)
                .header("Server", "TestServer/1.0")
                .header("X-Powered-By", "ASP.NET")
                .header("X-Powered-By", "ARR/2.5")
                .header("X-Aspnet-Version", "1.2.3")
                .body(Body::from("alive"))
                .unwrap(),
            "/plain" => hyper::Response::new(Body::from("plain")),
            "/method" => {
                let status = match *req.method() {
                    Method::POST => 201,
                    Method::HEAD => 204,
                    _ => 200,
                };
                hyper::Response::builder()
                    .status(status)
                    .body(Body::empty())
                    .unwrap()
            }
            "/slow" => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                hyper::Response::new(Body::from("late"))
            }
            "/redirect" => hyper::Response::builder()
                .status(302)
                .header("Location", "/plain")
                .body(Body::empty())
                .unwrap(),
            "/bad" => hyper::Response::builder()
                .status(500)
                .body(Body::from("error"))
                .unwrap(),
            _ => hyper::Response::builder()
                .status(404)
                .body(Body::from("not found"))
                .unwrap(),
        }
    }

    // Starts a local HTTP server and returns its port and a request counter
    async fn start_test_server() -> (u16, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let server_hits = hits.clone();
        let make_svc = make_service_fn(move |_conn| {
            let hits = server_hits.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Infallible>(route(req).await)
                    }
                }))
            }
        });

        let addr = ([127, 0, 0, 1], 0).into();
        let server = Server::bind(&addr).serve(make_svc);
        let port = server.local_addr().port();

        task::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Server error: {}", e);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        (port, hits)
    }

    fn dest(port: u16, path: &str, method: &str) -> PingDestination {
        PingDestination::new(
            "tenant",
            "test",
            "res-1",
            format!("http://127.0.0.1:{}{}", port, path),
            method,
        )
    }

    #[tokio::test]
    async fn test_get_success_with_traits() {
        let (port, _hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let status = pinger.ping(&dest(port, "/ok", "GET")).await;
        assert_eq!(status.code, 200);
        assert!(!status.timed_out);
        assert_eq!(
            status.traits.powered_by.as_deref(),
            Some("TestServer/1.0, ARR/2.5, ASP.NET/1.2.3")
        );
        assert!(status.timestamp > 0);
        assert_eq!(status.destination, dest(port, "/ok", "GET"));
    }

    #[tokio::test]
    async fn test_response_without_trait_headers() {
        let (port, _hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let status = pinger.ping(&dest(port, "/plain", "GET")).await;
        assert_eq!(status.code, 200);
        assert!(status.traits.is_empty());
    }

    #[tokio::test]
    async fn test_method_dispatch() {
        let (port, _hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        assert_eq!(pinger.ping(&dest(port, "/method", "GET")).await.code, 200);
        assert_eq!(pinger.ping(&dest(port, "/method", "HEAD")).await.code, 204);
        assert_eq!(pinger.ping(&dest(port, "/method", "POST")).await.code, 201);
        assert_eq!(pinger.ping(&dest(port, "/method", "head")).await.code, 204);
    }

    #[tokio::test]
    async fn test_unsupported_method_fails_fast_without_request() {
        let (port, hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let status = pinger.ping(&dest(port, "/ok", "DELETE")).await;
        assert_eq!(status.code, UNSUPPORTED_METHOD_CODE);
        assert!(!status.timed_out);
        assert_eq!(hits.load(Ordering::SeqCst), 0, "no request should be sent");
    }

    #[tokio::test]
    async fn test_error_status_is_reported_not_failed() {
        let (port, _hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let status = pinger.ping(&dest(port, "/bad", "GET")).await;
        assert_eq!(status.code, 500);
        assert!(!status.is_failure());

        let status = pinger.ping(&dest(port, "/missing", "GET")).await;
        assert_eq!(status.code, 404);
    }

    #[tokio::test]
    async fn test_redirects_are_followed() {
        let (port, hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let status = pinger.ping(&dest(port, "/redirect", "GET")).await;
        assert_eq!(status.code, 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout() {
        let (port, _hits) = start_test_server().await;
        let pinger = HttpPinger::new(Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let status = pinger.ping(&dest(port, "/slow", "GET")).await;
        assert!(status.timed_out);
        assert_eq!(status.code, TIMEOUT_CODE);
        assert!(status.duration_millis >= 150, "duration {}", status.duration_millis);
        assert!(started.elapsed() < Duration::from_secs(2), "probe was not abandoned");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let pinger = HttpPinger::new(Duration::from_secs(2)).unwrap();

        let status = pinger.ping(&dest(port, "/ok", "GET")).await;
        assert_eq!(status.code, TRANSPORT_FAILURE_CODE);
        assert!(!status.timed_out);
        assert!(status.traits.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let pinger = HttpPinger::new(Duration::from_secs(1)).unwrap();
        let destination = PingDestination::new("t", "e", "r", "not a url", "GET");

        let status = pinger.ping(&destination).await;
        assert_eq!(status.code, TRANSPORT_FAILURE_CODE);
    }

    #[test]
    fn test_from_config() {
        let config = PingerConfig {
            timeout_secs: 3,
            ..PingerConfig::default()
        };
        let pinger = HttpPinger::from_config(&config).unwrap();
        assert_eq!(pinger.timeout(), Duration::from_secs(3));
    }
}
