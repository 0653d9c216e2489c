// ABOUTME: Dialing configuration for the atomix service endpoint.
// ABOUTME: One channel is dialed per client and every primitive session multiplexes over it.

use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::error::{Error, ErrorKind, Result};

/// Port the atomix proxy listens on when an address names none.
pub const DEFAULT_PORT: u16 = 5678;

/// HTTP/2 keep-alive pings for the shared connection.
///
/// Watch streams stay open for the life of the application and are cut
/// silently by idle-connection reapers unless the connection is pinged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    pub interval: Duration,
    /// How long to wait for a ping acknowledgement before dropping the connection.
    pub timeout: Duration,
    /// Ping even when no watch or call is in flight.
    pub while_idle: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(20),
            while_idle: true,
        }
    }
}

/// Where and how to dial the atomix service.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    address: String,
    keep_alive: Option<KeepAliveConfig>,
    connect_timeout: Option<Duration>,
}

impl ChannelConfig {
    /// Accepts `host`, `host:port` or a full `http(s)://` URI.
    ///
    /// A missing scheme means plaintext and a missing port means
    /// [`DEFAULT_PORT`]. TLS is used exactly when the scheme is `https`.
    pub fn new(address: impl AsRef<str>) -> Self {
        Self {
            address: normalize_address(address.as_ref()),
            keep_alive: Some(KeepAliveConfig::default()),
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// The URI that will be dialed.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn uses_tls(&self) -> bool {
        self.address.starts_with("https://")
    }

    pub fn keep_alive(&self) -> Option<&KeepAliveConfig> {
        self.keep_alive.as_ref()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive = None;
        self
    }

    pub fn with_keep_alive(mut self, config: KeepAliveConfig) -> Self {
        self.keep_alive = Some(config);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the endpoint without dialing it.
    pub fn endpoint(&self) -> Result<Endpoint> {
        let mut endpoint = Endpoint::from_shared(self.address.clone()).map_err(|e| {
            Error::new(
                ErrorKind::Invalid,
                format!("invalid address {:?}: {}", self.address, e),
            )
        })?;

        if self.uses_tls() {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_enabled_roots())
                .map_err(|e| Error::new(ErrorKind::Invalid, format!("TLS config error: {}", e)))?;
        }

        if let Some(ka) = &self.keep_alive {
            endpoint = endpoint
                .http2_keep_alive_interval(ka.interval)
                .keep_alive_timeout(ka.timeout)
                .keep_alive_while_idle(ka.while_idle);
        }

        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        Ok(endpoint)
    }
}

fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let (scheme, rest) = match address.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("http".to_string(), address),
    };
    let (authority, path) = match rest.find('/') {
        Some(pos) => rest.split_at(pos),
        None => (rest, ""),
    };
    // A bracketed IPv6 host carries its own colons.
    let host_part = authority.rsplit(']').next().unwrap_or(authority);
    if authority.is_empty() || host_part.contains(':') {
        format!("{}://{}{}", scheme, authority, path)
    } else {
        format!("{}://{}:{}{}", scheme, authority, DEFAULT_PORT, path)
    }
}

/// Dial the atomix service.
pub async fn create_channel(config: &ChannelConfig) -> Result<Channel> {
    let channel = config.endpoint()?.connect().await?;

    tracing::debug!(
        address = %config.address,
        keep_alive = config.keep_alive.is_some(),
        tls = config.uses_tls(),
        "atomix channel connected"
    );

    Ok(channel)
}
