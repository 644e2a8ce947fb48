//! Connection handling for the client side of HTTP/1.1.
//!
//! [`ClientConnection`] runs one request/response exchange over any split
//! `AsyncRead` / `AsyncWrite` pair. It writes the request with
//! [`RequestEncoder`](crate::codec::RequestEncoder), reads the response with
//! [`ResponseDecoder`](crate::codec::ResponseDecoder) and streams payload chunks to the
//! caller as they arrive.

mod client_connection;

pub use client_connection::ClientConnection;
