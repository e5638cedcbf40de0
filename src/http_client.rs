//! Proxy-aware HTTP client construction.
//!
//! Both the tag crawler and the download manager obtain their
//! [`reqwest::Client`] from an [`HttpClientFactory`], so timeout,
//! user-agent, and proxy policy stay identical for page fetches and archive
//! transfers. The proxy string is validated when the factory is created:
//! a malformed proxy fails before any network activity happens.

use std::time::Duration;

use reqwest::{Client, Proxy, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout (5 minutes, archives can be large).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Timeout for the reachability probe.
const PROBE_TIMEOUT_SECS: u64 = 5;

/// Errors raised while validating proxy input or building clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The proxy option was supplied but contained nothing.
    #[error("proxy URL is empty")]
    EmptyProxy,

    /// The proxy could not be parsed or uses an unsupported shape.
    #[error("invalid proxy URL {proxy:?}: {reason}")]
    InvalidProxy {
        /// The rejected proxy string.
        proxy: String,
        /// Why it was rejected.
        reason: String,
    },

    /// reqwest refused the builder configuration.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    fn invalid_proxy(proxy: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProxy {
            proxy: proxy.to_string(),
            reason: reason.into(),
        }
    }
}

/// Raw client settings as resolved from CLI flags and configuration.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Forward proxy, unvalidated (`None` means connect directly).
    pub proxy: Option<String>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout; `None` disables it.
    pub timeout: Option<Duration>,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            user_agent: user_agent::default_user_agent(),
        }
    }
}

/// Parses and validates a proxy URL.
///
/// Only absolute `http`/`https` URLs with a host are accepted.
///
/// # Errors
///
/// Returns [`ClientError::EmptyProxy`] for blank input and
/// [`ClientError::InvalidProxy`] for anything that does not parse as a
/// usable proxy URL.
pub fn parse_proxy(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::EmptyProxy);
    }

    let url = Url::parse(trimmed).map_err(|e| ClientError::invalid_proxy(trimmed, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::invalid_proxy(
            trimmed,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ClientError::invalid_proxy(trimmed, "missing host"));
    }
    Ok(url)
}

/// Builds [`reqwest::Client`] instances wired through an optional proxy.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    proxy: Option<Url>,
    connect_timeout: Duration,
    timeout: Option<Duration>,
    user_agent: String,
}

impl HttpClientFactory {
    /// Validates the settings and creates a factory.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the proxy string is empty or malformed.
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let proxy = settings.proxy.as_deref().map(parse_proxy).transpose()?;
        debug!(proxy = ?proxy.as_ref().map(Url::as_str), "HTTP client factory configured");
        Ok(Self {
            proxy,
            connect_timeout: settings.connect_timeout,
            timeout: settings.timeout,
            user_agent: settings.user_agent,
        })
    }

    /// Returns the validated proxy, if any.
    #[must_use]
    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Builds a client using the configured proxy and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if reqwest rejects the configuration.
    pub fn build(&self) -> Result<Client, ClientError> {
        self.build_with(self.proxy.as_ref(), self.timeout)
    }

    fn build_with(&self, proxy: Option<&Url>, timeout: Option<Duration>) -> Result<Client, ClientError> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .gzip(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|source| ClientError::Build { source })?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|source| ClientError::Build { source })
    }

    /// Checks whether `probe_url` answers `200 OK`.
    ///
    /// Tries a direct connection first and falls back to the configured
    /// proxy. Any failure, including client construction, counts as
    /// unreachable.
    #[instrument(skip(self), fields(url = %probe_url))]
    pub async fn is_reachable(&self, probe_url: &Url) -> bool {
        let probe_timeout = Some(Duration::from_secs(PROBE_TIMEOUT_SECS));

        if let Ok(client) = self.build_with(None, probe_timeout)
            && probe(&client, probe_url).await
        {
            debug!("reachable without proxy");
            return true;
        }

        let Some(proxy) = self.proxy.as_ref() else {
            return false;
        };
        match self.build_with(Some(proxy), probe_timeout) {
            Ok(client) => probe(&client, probe_url).await,
            Err(e) => {
                warn!(error = %e, "could not build proxied probe client");
                false
            }
        }
    }
}

async fn probe(client: &Client, url: &Url) -> bool {
    match client.get(url.as_str()).send().await {
        Ok(response) => response.status() == StatusCode::OK,
        Err(e) => {
            debug!(url = %url, error = %e, "reachability probe failed");
            false
        }
    }
}
