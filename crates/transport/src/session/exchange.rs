//! The seam between a session and the network.
//!
//! A session hands each task's request to an [`Exchange`], which performs the round trip
//! and pushes payload bytes into the task's [`DataSink`] as they arrive. The bundled
//! [`Http1Exchange`] speaks plain HTTP/1.1 over TCP, one connection per task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONNECTION, HeaderValue};
use http::Request;
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::connection::ClientConnection;
use crate::protocol::{ResponseHead, TransportError};
use crate::session::{SessionDelegate, TaskId};

const DEFAULT_HTTP_PORT: u16 = 80;

/// Performs one HTTP round trip.
///
/// Implementations must feed payload chunks to `sink` in arrival order and return the
/// response head only after the last chunk was fed.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, request: Request<Bytes>, sink: &mut DataSink) -> Result<ResponseHead, TransportError>;
}

/// Where an exchange delivers the payload of one task.
pub struct DataSink {
    task_id: TaskId,
    delegate: Arc<dyn SessionDelegate>,
    received: u64,
}

impl DataSink {
    pub(crate) fn new(task_id: TaskId, delegate: Arc<dyn SessionDelegate>) -> Self {
        Self { task_id, delegate, received: 0 }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Total payload bytes delivered so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn receive(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.received += data.len() as u64;
        self.delegate.did_receive_data(self.task_id, data);
    }
}

impl std::fmt::Debug for DataSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSink").field("task_id", &self.task_id).field("received", &self.received).finish_non_exhaustive()
    }
}

/// Plain `http://` HTTP/1.1 exchange over a fresh TCP connection.
#[derive(Debug, Clone)]
pub struct Http1Exchange {
    connect_timeout: Duration,
}

impl Http1Exchange {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Exchange for Http1Exchange {
    async fn exchange(&self, mut request: Request<Bytes>, sink: &mut DataSink) -> Result<ResponseHead, TransportError> {
        let uri = request.uri();
        match uri.scheme_str() {
            Some("http") => {}
            Some(scheme) => return Err(TransportError::unsupported_scheme(scheme)),
            None => return Err(TransportError::invalid_request("request uri has no scheme")),
        }
        let authority = uri.authority().ok_or_else(|| TransportError::invalid_request("request uri has no host"))?;
        let address = (authority.host().to_owned(), authority.port_u16().unwrap_or(DEFAULT_HTTP_PORT));
        let authority = authority.to_string();

        let tcp_stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(tcp_stream)) => tcp_stream,
            Ok(Err(e)) => {
                error!(cause = %e, %authority, "connect failed");
                return Err(TransportError::connect(authority, e));
            }
            Err(_) => return Err(TransportError::TimedOut { timeout: self.connect_timeout }),
        };
        debug!(%authority, task = %sink.task_id(), "connected");

        request.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        let method = request.method().clone();

        let (reader, writer) = tcp_stream.into_split();
        ClientConnection::new(reader, writer, &method).exchange(request, |data| sink.receive(data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSessionDelegate;
    use mockall::predicate::eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sink(delegate: MockSessionDelegate) -> DataSink {
        DataSink::new(TaskId::next(), Arc::new(delegate))
    }

    #[tokio::test]
    async fn round_trip_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..n]).to_string();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 15\r\n\r\n{\"key\":\"value\"}")
                .await
                .unwrap();
            head
        });

        let mut delegate = MockSessionDelegate::new();
        delegate
            .expect_did_receive_data()
            .withf(|_, data| data.as_ref() == br#"{"key":"value"}"#)
            .times(1)
            .return_const(());
        let mut sink = sink(delegate);

        let request = Request::get(format!("http://{address}/ping")).body(Bytes::new()).unwrap();
        let head = Http1Exchange::new(Duration::from_secs(1)).exchange(request, &mut sink).await.unwrap();

        assert_eq!(head.status(), http::StatusCode::OK);
        assert_eq!(sink.received(), 15);

        let sent = server.await.unwrap();
        assert!(sent.starts_with("GET /ping HTTP/1.1\r\n"));
        assert!(sent.contains("connection: close\r\n"));
    }

    #[tokio::test]
    async fn rejects_https() {
        let mut delegate = MockSessionDelegate::new();
        delegate.expect_did_receive_data().never();
        let mut sink = sink(delegate);

        let request = Request::get("https://api.example.com/").body(Bytes::new()).unwrap();
        let result = Http1Exchange::new(Duration::from_secs(1)).exchange(request, &mut sink).await;

        assert!(matches!(result, Err(TransportError::UnsupportedScheme { ref scheme }) if scheme == "https"));
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        // bind then drop to get a port nobody listens on
        let address = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

        let mut sink = sink(MockSessionDelegate::new());
        let request = Request::get(format!("http://{address}/")).body(Bytes::new()).unwrap();
        let result = Http1Exchange::new(Duration::from_secs(1)).exchange(request, &mut sink).await;

        assert_eq!(result.unwrap_err().code(), -1004);
    }

    #[test]
    fn sink_skips_empty_chunks() {
        let mut delegate = MockSessionDelegate::new();
        delegate.expect_did_receive_data().with(mockall::predicate::always(), eq(Bytes::from_static(b"a"))).times(1).return_const(());
        let mut sink = sink(delegate);

        sink.receive(Bytes::new());
        sink.receive(Bytes::from_static(b"a"));
        assert_eq!(sink.received(), 1);
    }
}
