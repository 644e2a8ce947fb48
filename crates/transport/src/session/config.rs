use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
#[cfg(feature = "reqwest")]
use tracing::error;

use crate::session::exchange::{Exchange, Http1Exchange};
#[cfg(feature = "reqwest")]
use crate::session::reqwest_exchange::ReqwestExchange;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by every task of one [`Session`](crate::session::Session).
#[derive(Clone)]
pub struct SessionConfig {
    timeout: Duration,
    connect_timeout: Duration,
    additional_headers: HeaderMap,
    exchange: Arc<dyn Exchange>,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Upper bound for a whole exchange, from connect to the last payload byte.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Headers added to every request that does not set them itself.
    pub fn additional_headers(&self) -> &HeaderMap {
        &self.additional_headers
    }

    pub fn exchange(&self) -> &Arc<dyn Exchange> {
        &self.exchange
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfigBuilder::new().build()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("additional_headers", &self.additional_headers)
            .finish_non_exhaustive()
    }
}

pub struct SessionConfigBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    additional_headers: HeaderMap,
    exchange: Option<Arc<dyn Exchange>>,
}

impl SessionConfigBuilder {
    fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            additional_headers: HeaderMap::new(),
            exchange: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn additional_headers(mut self, headers: HeaderMap) -> Self {
        self.additional_headers = headers;
        self
    }

    /// Replaces the network exchange, for example with [`Http1Exchange`] or a scripted one in
    /// tests. Defaults to [`ReqwestExchange`](crate::session::ReqwestExchange) when the
    /// `reqwest` feature is enabled, [`Http1Exchange`] otherwise.
    pub fn exchange(mut self, exchange: impl Exchange + 'static) -> Self {
        self.exchange = Some(Arc::new(exchange));
        self
    }

    pub fn build(self) -> SessionConfig {
        let exchange = self.exchange.unwrap_or_else(|| default_exchange(self.connect_timeout));
        SessionConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            additional_headers: self.additional_headers,
            exchange,
        }
    }
}

#[cfg(feature = "reqwest")]
fn default_exchange(connect_timeout: Duration) -> Arc<dyn Exchange> {
    match ReqwestExchange::new(connect_timeout) {
        Ok(exchange) => Arc::new(exchange),
        Err(e) => {
            error!(cause = %e, "failed to build the reqwest client, falling back to plain http");
            Arc::new(Http1Exchange::new(connect_timeout))
        }
    }
}

#[cfg(not(feature = "reqwest"))]
fn default_exchange(connect_timeout: Duration) -> Arc<dyn Exchange> {
    Arc::new(Http1Exchange::new(connect_timeout))
}

impl fmt::Debug for SessionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfigBuilder")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
