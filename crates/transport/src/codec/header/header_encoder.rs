//! Request head encoder.
//!
//! Writes the request line and header fields of an HTTP/1.1 request in origin form and
//! fills in `Host` plus the framing header for the body that follows.
//!
//! # Features
//!
//! - origin-form request target (`/path?query`), `/` when the URI has no path
//! - `Host` derived from the URI authority unless the request sets it
//! - `Content-Length` or `Transfer-Encoding: chunked` chosen from the [`PayloadSize`]
//! - an explicit `Content-Length: 0` for empty `POST`, `PUT` and `PATCH` bodies

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Method, Request, header};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadSize, SendError};

/// Initial buffer size reserved for the request head
const INIT_HEADER_SIZE: usize = 1024;

/// Encoder for HTTP request heads implementing the [`Encoder`] trait.
///
/// This encoder serializes a `Request<()>` and its [`PayloadSize`] into raw bytes. Framing
/// headers set by the caller are overwritten so they always match the payload that is
/// actually written.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(Request<()>, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes a request head into the destination buffer.
    ///
    /// # Arguments
    ///
    /// * `item` - the request head and the size of the payload that will follow it
    /// * `dst` - the buffer the head is written to
    ///
    /// # Errors
    ///
    /// Returns `SendError::InvalidHead` if the URI has no authority or the authority is not a
    /// valid `Host` value.
    fn encode(&mut self, item: (Request<()>, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        let uri = head.uri();
        let authority = uri.authority().ok_or_else(|| SendError::invalid_head("request uri has no authority"))?.clone();
        let target = uri.path_and_query().map(|pq| pq.as_str()).filter(|pq| !pq.is_empty()).unwrap_or("/");

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} HTTP/1.1\r\n", head.method(), target)?;

        let zero_length = needs_zero_length(head.method());
        let headers = head.headers_mut();
        if !headers.contains_key(header::HOST) {
            let host = HeaderValue::from_str(authority.as_str()).map_err(|e| SendError::invalid_head(e.to_string()))?;
            headers.insert(header::HOST, host);
        }

        match payload_size {
            PayloadSize::Length(n) => {
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::Empty if zero_length => {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
            PayloadSize::Empty | PayloadSize::UntilClose => {}
        }

        for (name, value) in head.headers() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Methods whose requests are expected to carry a body announce an empty one explicitly.
fn needs_zero_length(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// `io::Write` over a `BytesMut` that already has room reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
