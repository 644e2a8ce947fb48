//! An [`Exchange`] backed by a [`reqwest::Client`].
//!
//! This is the default exchange of a [`SessionConfig`](crate::session::SessionConfig) when
//! the `reqwest` feature is enabled. TLS, redirects and connection pooling come from
//! reqwest; the payload is still streamed to the task's [`DataSink`] chunk by chunk.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::{debug, error};

use crate::protocol::{ParseError, ResponseHead, SendError, TransportError};
use crate::session::exchange::{DataSink, Exchange};

/// `http://` and `https://` exchange sharing one pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestExchange {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl ReqwestExchange {
    /// Builds the underlying client.
    ///
    /// # Errors
    ///
    /// Fails when reqwest cannot initialize its TLS backend.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self::with_client(client, connect_timeout))
    }

    /// Wraps a preconfigured client. `connect_timeout` should match the one `client` was
    /// built with; it is reported in [`TransportError::TimedOut`].
    pub fn with_client(client: reqwest::Client, connect_timeout: Duration) -> Self {
        Self { client, connect_timeout }
    }

    fn transport_error(&self, e: reqwest::Error, authority: &str) -> TransportError {
        if e.is_timeout() {
            TransportError::TimedOut { timeout: self.connect_timeout }
        } else if e.is_connect() {
            TransportError::connect(authority, io::Error::other(e))
        } else if e.is_builder() {
            TransportError::invalid_request(e)
        } else if e.is_request() {
            SendError::io(io::Error::other(e)).into()
        } else {
            ParseError::io(io::Error::other(e)).into()
        }
    }
}

#[async_trait]
impl Exchange for ReqwestExchange {
    async fn exchange(&self, request: Request<Bytes>, sink: &mut DataSink) -> Result<ResponseHead, TransportError> {
        match request.uri().scheme_str() {
            Some("http" | "https") => {}
            Some(scheme) => return Err(TransportError::unsupported_scheme(scheme)),
            None => return Err(TransportError::invalid_request("request uri has no scheme")),
        }
        let authority = request.uri().authority().map(ToString::to_string).unwrap_or_default();

        let (parts, body) = request.into_parts();
        let reqwest_request = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .build()
            .map_err(|e| self.transport_error(e, &authority))?;

        let mut response = self.client.execute(reqwest_request).await.map_err(|e| {
            error!(cause = %e, %authority, "request failed");
            self.transport_error(e, &authority)
        })?;
        debug!(%authority, task = %sink.task_id(), status = %response.status(), "received response head");

        let mut head = Response::new(());
        *head.status_mut() = response.status();
        *head.version_mut() = response.version();
        *head.headers_mut() = response.headers().clone();

        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e, &authority))? {
            sink.receive(chunk);
        }
        Ok(head)
    }
}
