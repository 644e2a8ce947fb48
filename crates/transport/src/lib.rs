//! The transport half of micro-api: an asynchronous HTTP/1.1 client session.
//!
//! A [`Session`](session::Session) turns `http::Request<Bytes>` values into
//! [`DataTask`](session::DataTask)s. Running tasks stream the response payload to a
//! [`SessionDelegate`](session::SessionDelegate) chunk by chunk and then report exactly one
//! outcome: the response head, or a [`TransportError`](protocol::TransportError).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use http::Request;
//! use micro_api_transport::protocol::{ResponseHead, TransportError};
//! use micro_api_transport::session::{Session, SessionConfig, SessionDelegate, TaskId};
//! use tracing::info;
//!
//! struct Printer;
//!
//! impl SessionDelegate for Printer {
//!     fn did_receive_data(&self, task_id: TaskId, data: Bytes) {
//!         info!(%task_id, len = data.len(), "received data");
//!     }
//!
//!     fn did_complete(&self, task_id: TaskId, result: Result<ResponseHead, TransportError>) {
//!         info!(%task_id, ok = result.is_ok(), "completed");
//!     }
//! }
//!
//! let session = Session::new(SessionConfig::default(), Arc::new(Printer), None);
//! let request = Request::get("http://127.0.0.1:8080/").body(Bytes::new()).unwrap();
//! session.data_task(request).resume();
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: response head, payload items and the error types
//! - [`codec`]: request encoder and streaming response decoder
//! - [`connection`]: one exchange over an `AsyncRead` / `AsyncWrite` pair
//! - [`session`]: sessions, tasks, delegates and the pluggable [`Exchange`](session::Exchange)
//! - [`utils`]: poison-tolerant locking and panic payload helpers
//!
//! # Limitations
//!
//! - the default exchange (`reqwest` feature, on by default) speaks `http://` and `https://`
//!   and follows reqwest's redirect and pooling policy
//! - the bundled [`Http1Exchange`](session::Http1Exchange) is HTTP/1.x, plain `http://` only,
//!   one connection per task, no redirects
//! - maximum response head size for `Http1Exchange`: 16KB, maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod session;

pub mod utils;
pub(crate) use utils::ensure;
