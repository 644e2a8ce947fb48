//! Decoder over every payload framing an HTTP/1.x response can use.
//!
//! The framing is chosen from the response head (see [`PayloadSize`]):
//! - `Content-Length` payloads
//! - chunked transfer encoding
//! - payloads delimited by the peer closing the connection
//! - responses without a body

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A unified decoder over the payload framings a response can use.
///
/// Every framing yields `PayloadItem::Chunk` values and then exactly one `PayloadItem::Eof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    /// The specific decoding strategy to use
    kind: Kind,
}

/// Decoding strategies, one per framing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// no framing, the body ends when the connection does
    UntilClose,

    /// Handle responses with no body
    NoBody,
}

impl PayloadDecoder {
    /// Creates a decoder for a response without a body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Creates a decoder for a chunked payload.
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    /// Creates a decoder for a payload of exactly `size` bytes.
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// Creates a decoder that reads until the peer closes the connection.
    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => PayloadDecoder::fix_length(length),
            PayloadSize::Chunked => PayloadDecoder::chunked(),
            PayloadSize::UntilClose => PayloadDecoder::until_close(),
            PayloadSize::Empty => PayloadDecoder::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes the next payload item from the read buffer.
    ///
    /// # Arguments
    ///
    /// * `src` - the read buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when payload bytes are available
    /// - `Ok(Some(PayloadItem::Eof))` once the payload is complete
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the framing is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::UntilClose if src.is_empty() => Ok(None),
            Kind::UntilClose => Ok(Some(PayloadItem::Chunk(src.split().freeze()))),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    /// Decodes the rest of the payload after the peer closed the connection.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidBody` when a length-delimited or chunked payload is cut off.
    /// For until-close payloads the end of the stream is the end of the payload.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode_eof(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode_eof(src),
            Kind::UntilClose => match self.decode(src)? {
                Some(item) => Ok(Some(item)),
                None => Ok(Some(PayloadItem::Eof)),
            },
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
