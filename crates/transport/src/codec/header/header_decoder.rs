//! Response head decoder.
//!
//! Parses the status line and header fields of an HTTP/1.x response with `httparse`, then
//! works out how the payload that follows is framed
//! ([RFC 9112 Section 6.3](https://www.rfc-editor.org/rfc/rfc9112#section-6.3)):
//!
//! 1. responses to `HEAD`, `1xx`, `204` and `304` never carry a body
//! 2. `Transfer-Encoding` ending in `chunked` means chunked framing
//! 3. any other `Transfer-Encoding` means the body runs until the connection closes
//! 4. a valid `Content-Length` gives a fixed length
//! 5. otherwise the body runs until the connection closes
//!
//! Header names and values are copied out of the read buffer through recorded byte
//! ranges, so the buffer is split once and every value shares the same allocation.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 16KB
//! - Only HTTP/1.0 and HTTP/1.1 responses are accepted

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Response, StatusCode};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, ResponseHead};

/// Maximum number of header fields accepted in a response
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes of the status line plus header section
const MAX_HEADER_BYTES: usize = 16 * 1024;

/// Decodes a [`ResponseHead`] together with the [`PayloadSize`] of the body that follows it.
///
/// The decoder has to know whether the request was a `HEAD`, because such a response
/// announces a body it never sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder {
    /// the response answers a `HEAD` request, so it has no body whatever the headers say
    head_request: bool,
}

impl HeaderDecoder {
    /// Creates a decoder for the response to a request; `head_request` is true for `HEAD`.
    pub fn new(head_request: bool) -> Self {
        Self { head_request }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (ResponseHead, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode a response head from the read buffer.
    ///
    /// # Arguments
    ///
    /// * `src` - the read buffer; on success the head bytes are split off its front
    ///
    /// # Returns
    ///
    /// - `Ok(Some((head, payload_size)))` once a complete head was parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - the number of headers exceeds `MAX_HEADER_NUM`
    /// - the head grows beyond `MAX_HEADER_BYTES`
    /// - the version is not HTTP/1.0 or HTTP/1.1, or the status code is invalid
    /// - a header name or value contains invalid characters
    /// - `Content-Length` is not a valid `u64`
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest possible head: "HTTP/1.1 200\r\n\r\n"
        if src.len() < 16 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut resp = httparse::Response::new(&mut headers);

        let parsed = resp.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            Error::Version => ParseError::InvalidVersion(None),
            Error::Status => ParseError::InvalidStatus,
            e => ParseError::invalid_header(e.to_string()),
        })?;

        let body_offset = match parsed {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(header_size = body_offset, "parsed response head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match resp.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };
        let status = resp.code.and_then(|code| StatusCode::from_u16(code).ok()).ok_or(ParseError::InvalidStatus)?;

        let header_count = resp.headers.len();
        let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
        HeaderIndex::record(src, resp.headers, &mut header_index);

        let header_bytes = src.split_to(body_offset).freeze();

        let mut head = Response::new(());
        *head.status_mut() = status;
        *head.version_mut() = version;

        let head_headers = head.headers_mut();
        head_headers.reserve(header_count);
        for index in &header_index[..header_count] {
            let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1])
                .map_err(|e| ParseError::invalid_header(e.to_string()))?;
            let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
                .map_err(|e| ParseError::invalid_header(e.to_string()))?;
            head_headers.append(name, value);
        }

        let payload_size = parse_payload(&head, self.head_request)?;
        Ok(Some((head, payload_size)))
    }
}

/// Byte ranges of one header's name and value inside the read buffer.
///
/// Recording ranges while `httparse` still borrows the buffer lets the decoder split the
/// buffer afterwards and slice every name and value out of the same frozen `Bytes`.
#[derive(Clone, Copy)]
struct HeaderIndex {
    /// start and end byte positions of the header name
    name: (usize, usize),
    /// start and end byte positions of the header value
    value: (usize, usize),
}

impl HeaderIndex {
    const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    /// Records the byte positions of the parsed header names and values.
    ///
    /// # Arguments
    ///
    /// * `bytes` - the buffer `headers` were parsed from
    /// * `headers` - header references produced by `httparse`
    /// * `indices` - output slice, at least as long as `headers`
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            index.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Determines how the body after `head` is framed.
///
/// # Arguments
///
/// * `head` - the parsed response head
/// * `head_request` - whether the response answers a `HEAD` request
///
/// # Returns
///
/// - `PayloadSize::Empty` for `HEAD` responses, `1xx`, `204` and `304`
/// - `PayloadSize::Chunked` if `chunked` is the final transfer coding
/// - `PayloadSize::UntilClose` for any other transfer coding, or without framing headers
/// - `PayloadSize::Length` from a valid `Content-Length`
///
/// # Errors
///
/// Returns `ParseError::InvalidContentLength` if `Content-Length` is not a valid `u64`.
fn parse_payload(head: &ResponseHead, head_request: bool) -> Result<PayloadSize, ParseError> {
    let status = head.status();
    if head_request
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(PayloadSize::new_empty());
    }

    let te_header = head.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = head.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        // transfer-encoding overrides content-length
        (Some(te_value), _) if is_chunked(te_value) => Ok(PayloadSize::new_chunked()),
        (Some(_), _) => Ok(PayloadSize::new_until_close()),

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            Ok(PayloadSize::new_length(length))
        }

        (None, None) => Ok(PayloadSize::new_until_close()),
    }
}

/// Checks whether a `Transfer-Encoding` value frames the body as chunked.
///
/// `chunked` must be the last transfer coding to frame the message, and is matched
/// case-insensitively.
///
/// # Arguments
///
/// * `value` - the `Transfer-Encoding` header value
fn is_chunked(value: &HeaderValue) -> bool {
    value
        .as_bytes()
        .rsplit(|b| *b == b',')
        .next()
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Version;
    use indoc::indoc;

    fn decode(raw: &str, head_request: bool) -> (ResponseHead, PayloadSize, BytesMut) {
        let mut buf = BytesMut::from(raw.replace('\n', "\r\n").as_str());
        let (head, size) = HeaderDecoder::new(head_request).decode(&mut buf).unwrap().unwrap();
        (head, size, buf)
    }

    #[test]
    fn content_length_response() {
        let raw = indoc! {r#"
        HTTP/1.1 200 OK
        Content-Type: application/json
        Content-Length: 15

        {"key":"value"}"#};

        let (head, size, rest) = decode(raw, false);

        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(head.headers().get(http::header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(size, PayloadSize::Length(15));
        assert_eq!(&rest[..], br#"{"key":"value"}"#);
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let raw = indoc! {r#"
        HTTP/1.1 200 OK
        Transfer-Encoding: gzip, Chunked
        Content-Length: 10

        "#};

        let (_, size, _) = decode(raw, false);
        assert!(size.is_chunked());
    }

    #[test]
    fn bodyless_responses() {
        let no_content = indoc! {r#"
        HTTP/1.1 204 No Content
        Content-Length: 10

        "#};
        assert!(decode(no_content, false).1.is_empty());

        let head_reply = indoc! {r#"
        HTTP/1.1 200 OK
        Content-Length: 10

        "#};
        assert!(decode(head_reply, true).1.is_empty());
    }

    #[test]
    fn missing_framing_reads_until_close() {
        let raw = indoc! {r#"
        HTTP/1.0 200 OK
        Server: legacy

        "#};

        let (head, size, _) = decode(raw, false);
        assert_eq!(head.version(), Version::HTTP_10);
        assert_eq!(size, PayloadSize::UntilClose);
    }

    #[test]
    fn partial_head_waits_for_more() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Le"[..]);
        assert!(HeaderDecoder::new(false).decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 27);
    }

    #[test]
    fn rejects_bad_content_length() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n"[..]);
        let result = HeaderDecoder::new(false).decode(&mut buf);
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn rejects_oversized_partial_head() {
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nX-Filler: ");
        buf.extend_from_slice(&vec![b'a'; MAX_HEADER_BYTES]);
        let result = HeaderDecoder::new(false).decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeHeader { .. })));
    }
}
