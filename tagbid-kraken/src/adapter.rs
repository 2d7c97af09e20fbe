#[cfg(feature = "test-adapters")]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use tagbid_core::TagbidError;

use crate::GATEWAY_NAME;

/// Transport abstraction (so we can inject mocks in tests).
#[async_trait]
pub trait KrakenTransport: Send + Sync {
    /// Issue one GET request and return the response body.
    ///
    /// Implementations must fail with `TagbidError::Gateway` for transport
    /// errors and non-success statuses.
    async fn get(&self, url: &Url) -> Result<String, TagbidError>;
}

/// Production adapter backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct RealAdapter {
    client: reqwest::Client,
}

impl RealAdapter {
    /// Build a client that gives up on a request after `timeout`.
    ///
    /// # Errors
    /// Returns `TagbidError::Gateway` if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, TagbidError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| map_http_err(&e, "client setup"))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_http_err(e: &reqwest::Error, context: &str) -> TagbidError {
    if e.is_timeout() {
        return TagbidError::gateway(GATEWAY_NAME, format!("timeout: {context}"));
    }
    if let Some(status) = e.status() {
        return TagbidError::gateway(GATEWAY_NAME, format!("status {status}: {context}"));
    }
    if e.is_connect() {
        return TagbidError::gateway(GATEWAY_NAME, format!("connect: {context}"));
    }
    TagbidError::gateway(GATEWAY_NAME, format!("{context}: {e}"))
}

#[async_trait]
impl KrakenTransport for RealAdapter {
    async fn get(&self, url: &Url) -> Result<String, TagbidError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| map_http_err(&e, "bid request"))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| map_http_err(&e, "bid request"))?;
        resp.text()
            .await
            .map_err(|e| map_http_err(&e, "bid response body"))
    }
}

#[cfg(feature = "test-adapters")]
impl dyn KrakenTransport {
    /// Build a `KrakenTransport` from a closure (tests only).
    pub fn from_fn<F>(f: F) -> Arc<dyn KrakenTransport>
    where
        F: Send + Sync + 'static + Fn(Url) -> Result<String, TagbidError>,
    {
        struct FnTransport<F>(F);
        #[async_trait]
        impl<F> KrakenTransport for FnTransport<F>
        where
            F: Send + Sync + 'static + Fn(Url) -> Result<String, TagbidError>,
        {
            async fn get(&self, url: &Url) -> Result<String, TagbidError> {
                (self.0)(url.clone())
            }
        }
        Arc::new(FnTransport(f))
    }
}
