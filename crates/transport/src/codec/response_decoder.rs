//! Streaming decoder for HTTP/1.1 responses.
//!
//! Yields one [`Message::Header`] for the final response head followed by
//! [`Message::Payload`] items ending with [`PayloadItem::Eof`]. Interim `1xx` responses
//! (other than `101 Switching Protocols`) are consumed silently.

use bytes::BytesMut;
use http::StatusCode;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHead};

/// Two phase decoder: the head first, then the payload it announced.
///
/// `payload_decoder` is `None` while a head is being parsed.
#[derive(Debug)]
pub struct ResponseDecoder {
    /// Decoder for the status line and headers
    header_decoder: HeaderDecoder,
    /// Decoder for the payload of the current response, if its head was read
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    /// Creates a decoder for the response to a request; `head_request` marks a `HEAD` request.
    pub fn new(head_request: bool) -> Self {
        Self { header_decoder: HeaderDecoder::new(head_request), payload_decoder: None }
    }

    fn decode_payload(&mut self, item: Option<PayloadItem>) -> Option<Message<(ResponseHead, PayloadSize)>> {
        match item {
            Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
            Some(item @ PayloadItem::Eof) => {
                self.payload_decoder.take();
                Some(Message::Payload(item))
            }
            None => None,
        }
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    /// Decodes the next message from the read buffer.
    ///
    /// # Arguments
    ///
    /// * `src` - the read buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header((head, payload_size))))` for the final response head
    /// - `Ok(Some(Message::Payload(item)))` for payload chunks and the closing `Eof`
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the head or the payload framing is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            return Ok(self.decode_payload(item));
        }

        loop {
            let Some((head, payload_size)) = self.header_decoder.decode(src)? else {
                return Ok(None);
            };

            if head.status().is_informational() && head.status() != StatusCode::SWITCHING_PROTOCOLS {
                trace!(status = %head.status(), "skipped interim response");
                continue;
            }

            self.payload_decoder = Some(payload_size.into());
            return Ok(Some(Message::Header((head, payload_size))));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            return Ok(self.decode_payload(item));
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header("connection closed inside response head")),
        }
    }
}
