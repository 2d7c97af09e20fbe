use std::sync::Arc;

use url::Url;

#[cfg(feature = "test-adapters")]
use crate::adapter::KrakenTransport;
use crate::adapter::RealAdapter;
use crate::ids::{CookieSource, NoCookies};
use crate::{DEFAULT_HOST, KrakenConnector};
use tagbid_core::{PartnerConfig, TagbidError};

/// Builder for [`KrakenConnector`].
///
/// Only the partner configuration is required. Without cookies every request
/// carries empty ids; without a client one is built with the configured
/// timeout.
pub struct KrakenConnectorBuilder {
    cfg: PartnerConfig,
    host: Option<String>,
    cookies: Option<Arc<dyn CookieSource>>,
    client: Option<reqwest::Client>,
    #[cfg(feature = "test-adapters")]
    transport: Option<Arc<dyn KrakenTransport>>,
}

impl KrakenConnectorBuilder {
    /// Start from a partner configuration.
    #[must_use]
    pub const fn new(cfg: PartnerConfig) -> Self {
        Self {
            cfg,
            host: None,
            cookies: None,
            client: None,
            #[cfg(feature = "test-adapters")]
            transport: None,
        }
    }

    /// Override the bid endpoint host (defaults to [`DEFAULT_HOST`]).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Where user and sync id cookies are read from on each request.
    #[must_use]
    pub fn cookies(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Use a preconfigured HTTP client. Its own timeout applies.
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the HTTP transport (tests only).
    #[cfg(feature = "test-adapters")]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn KrakenTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and build the connector.
    ///
    /// # Errors
    /// `TagbidError::InvalidConfig` if the configuration is invalid,
    /// `TagbidError::InvalidArg` for an unusable host, and
    /// `TagbidError::Gateway` if the HTTP client cannot be built.
    pub fn build(self) -> Result<KrakenConnector, TagbidError> {
        self.cfg.validate()?;

        let raw_host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let host = Url::parse(raw_host)
            .map_err(|e| TagbidError::invalid_arg(format!("host {raw_host}: {e}")))?;
        if host.cannot_be_a_base() {
            return Err(TagbidError::invalid_arg(format!(
                "host {raw_host} cannot carry a path"
            )));
        }

        #[cfg(feature = "test-adapters")]
        let transport: Arc<dyn KrakenTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(real_adapter(self.client, &self.cfg)?),
        };
        #[cfg(not(feature = "test-adapters"))]
        let transport = Arc::new(real_adapter(self.client, &self.cfg)?);

        let cookies = self.cookies.unwrap_or_else(|| Arc::new(NoCookies));
        Ok(KrakenConnector::from_parts(host, transport, cookies, self.cfg))
    }
}

fn real_adapter(
    client: Option<reqwest::Client>,
    cfg: &PartnerConfig,
) -> Result<RealAdapter, TagbidError> {
    match client {
        Some(c) => Ok(RealAdapter::from_client(c)),
        None => RealAdapter::new(cfg.timeout()),
    }
}
