//! HTTP client for fetching aircraft data from the public feed.

use crate::geo::Coordinate;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    Client, StatusCode,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned non-OK status: {status}")]
    NonOkStatus { status: StatusCode },
    #[error("Empty response body")]
    EmptyBody,
    #[error("Non-JSON content type: {content_type:?}")]
    NonJsonContent { content_type: String },
}

/// Anything that can perform a feed GET and hand back a validated body.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ClientError>;
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        (**self).fetch(url).await
    }
}

/// Upstream feed URLs.
#[derive(Debug, Clone)]
pub struct FeedEndpoints {
    pub base_url: String,
    /// Center of the civilian query
    pub observer: Coordinate,
    /// Radius of the civilian query in nautical miles
    pub radius_nm: u32,
}

impl FeedEndpoints {
    pub const DEFAULT_BASE_URL: &'static str = "https://opendata.adsb.fi";

    pub fn new(base_url: impl Into<String>, observer: Coordinate, radius_nm: u32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            observer,
            radius_nm,
        }
    }

    pub fn civilian_url(&self) -> String {
        format!(
            "{}/api/v2/lat/{:.6}/lon/{:.6}/dist/{}",
            self.base_url,
            self.observer.latitude(),
            self.observer.longitude(),
            self.radius_nm
        )
    }

    pub fn military_url(&self) -> String {
        format!("{}/api/v2/mil", self.base_url)
    }
}

/// Configuration for the feed client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Request timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Ignore proxy settings from the environment
    pub no_proxy: bool,
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    pub fn without_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }
}

/// reqwest backed [`FeedSource`].
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let user_agent = config
            .user_agent
            .unwrap_or_else(|| concat!("skywatch/", env!("CARGO_PKG_VERSION")).to_string());

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.no_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        tracing::debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::NonOkStatus { status });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ClientError::EmptyBody);
        }

        if !content_type.contains("application/json") {
            return Err(ClientError::NonJsonContent { content_type });
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a loopback port and return its URL.
    async fn serve_once(status_line: &str, content_type: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            content_type,
            body.len(),
            body
        );

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/api/v2/mil", addr)
    }

    fn client() -> FeedClient {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(5))
            .without_proxy();
        FeedClient::new(config).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let observer = Coordinate::new(1.359297, 103.989348).unwrap();
        let endpoints = FeedEndpoints::new("https://opendata.adsb.fi/", observer, 250);
        assert_eq!(
            endpoints.civilian_url(),
            "https://opendata.adsb.fi/api/v2/lat/1.359297/lon/103.989348/dist/250"
        );
        assert_eq!(endpoints.military_url(), "https://opendata.adsb.fi/api/v2/mil");
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let url = serve_once("200 OK", "application/json; charset=utf-8", r#"{"ac":[]}"#).await;
        let body = client().fetch(&url).await.unwrap();
        assert_eq!(body, br#"{"ac":[]}"#);
    }

    #[tokio::test]
    async fn test_fetch_non_ok_status() {
        let url = serve_once("503 Service Unavailable", "application/json", r#"{"ac":[]}"#).await;
        match client().fetch(&url).await {
            Err(ClientError::NonOkStatus { status }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("expected NonOkStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let url = serve_once("200 OK", "application/json", "").await;
        assert!(matches!(client().fetch(&url).await, Err(ClientError::EmptyBody)));
    }

    #[tokio::test]
    async fn test_fetch_non_json() {
        let url = serve_once("200 OK", "text/html", "<html></html>").await;
        match client().fetch(&url).await {
            Err(ClientError::NonJsonContent { content_type }) => assert_eq!(content_type, "text/html"),
            other => panic!("expected NonJsonContent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/api/v2/mil", addr);
        assert!(matches!(client().fetch(&url).await, Err(ClientError::Request(_))));
    }
}
