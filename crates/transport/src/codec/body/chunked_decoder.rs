//! Decoder for `Transfer-Encoding: chunked` response payloads
//! ([RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1)).
//!
//! Chunk extensions and trailer fields are validated for framing and then dropped.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, Bytes, BytesMut};
use std::cmp;
use tokio_util::codec::Decoder;
use tracing::trace;

/// State machine decoder for chunked payloads.
///
/// Framing bytes are consumed one at a time; chunk data is returned in slices as large as
/// the read buffer allows, so a chunk may be yielded in several pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    /// Current position inside the chunked framing
    state: State,
    /// Data bytes left in the current chunk, or the chunk size being parsed
    remaining: u64,
}

/// Positions inside the chunked framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// hex digits of the chunk size
    Size,
    /// whitespace after the size
    SizeLws,
    /// `;name=value` extensions, ignored
    Extension,
    /// LF closing the size line
    SizeLf,
    /// chunk data
    Data,
    /// CR after chunk data
    DataCr,
    /// LF after chunk data
    DataLf,
    /// first byte of a trailer line, or the CR of the final empty line
    TrailerStart,
    /// rest of a trailer field line
    Trailer,
    /// LF closing a trailer field line
    TrailerLf,
    /// LF of the final empty line
    EndLf,
    End,
}

impl ChunkedDecoder {
    /// Creates a decoder positioned before the first chunk size line.
    pub fn new() -> Self {
        Self { state: State::Size, remaining: 0 }
    }

    /// Whether the final empty chunk and the trailer section were read.
    pub fn is_finished(&self) -> bool {
        self.state == State::End
    }

    /// Consumes one framing byte and computes the next state.
    ///
    /// # Arguments
    ///
    /// * `byte` - the next byte of the framing
    ///
    /// # Returns
    ///
    /// The state to move to.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidBody` for malformed size lines, missing CRLFs and chunk
    /// sizes that overflow `u64`.
    fn step(&mut self, byte: u8) -> Result<State, ParseError> {
        use State::*;

        let next = match (self.state, byte) {
            (Size, b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => {
                let digit = (byte as char).to_digit(16).map(u64::from).unwrap_or_default();
                self.remaining = self
                    .remaining
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))?;
                Size
            }
            (Size | SizeLws, b'\t' | b' ') => SizeLws,
            (Size | SizeLws, b';') => Extension,
            (Size | SizeLws | Extension, b'\r') => SizeLf,
            (Size | SizeLws, _) => return Err(ParseError::invalid_body("invalid chunk size line")),
            (Extension, b'\n') => return Err(ParseError::invalid_body("chunk extension contains newline")),
            (Extension, _) => Extension,
            (SizeLf, b'\n') if self.remaining == 0 => TrailerStart,
            (SizeLf, b'\n') => Data,
            (SizeLf, _) => return Err(ParseError::invalid_body("invalid chunk size LF")),
            (DataCr, b'\r') => DataLf,
            (DataCr, _) => return Err(ParseError::invalid_body("invalid chunk data CR")),
            (DataLf, b'\n') => Size,
            (DataLf, _) => return Err(ParseError::invalid_body("invalid chunk data LF")),
            (TrailerStart, b'\r') => EndLf,
            (TrailerStart | Trailer, b'\r') => TrailerLf,
            (TrailerStart | Trailer, _) => Trailer,
            (TrailerLf, b'\n') => TrailerStart,
            (TrailerLf, _) => return Err(ParseError::invalid_body("invalid trailer LF")),
            (EndLf, b'\n') => End,
            (EndLf, _) => return Err(ParseError::invalid_body("invalid chunked end LF")),
            (Data | End, _) => self.state,
        };
        Ok(next)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes the next payload item from the read buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` with the chunk data available so far
    /// - `Ok(Some(PayloadItem::Eof))` after the last chunk and the trailers
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the framing is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == State::End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            if self.state == State::Data {
                let len = cmp::min(self.remaining, src.len() as u64) as usize;
                let bytes: Bytes = src.split_to(len).freeze();
                self.remaining -= len as u64;
                if self.remaining == 0 {
                    self.state = State::DataCr;
                }
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            let byte = src.get_u8();
            self.state = self.step(byte)?;
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::invalid_body("connection closed inside chunked body")),
        }
    }
}
