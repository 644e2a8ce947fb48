//! Decoder for response payloads delimited by `Content-Length`
//! ([RFC 9112 Section 6.3](https://www.rfc-editor.org/rfc/rfc9112#section-6.3)).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Yields chunks until exactly `length` bytes were read, then `Eof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// bytes still expected from the peer
    remaining: u64,
}

impl LengthDecoder {
    /// Creates a decoder expecting exactly `length` payload bytes.
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Bytes still expected from the peer.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes the next chunk of at most `remaining` bytes.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` with the bytes available so far
    /// - `Ok(Some(PayloadItem::Eof))` once `length` bytes were read
    /// - `Ok(None)` if more data is needed
    ///
    /// Bytes beyond `length` are left in `src`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::invalid_body(format!("connection closed with {} body bytes missing", self.remaining))),
        }
    }
}
