use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::{Method, Request};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, trace};

use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::protocol::{Message, ParseError, PayloadItem, ResponseHead, TransportError};

/// Initial read buffer capacity
const READ_CAPACITY: usize = 8 * 1024;

/// One request/response exchange over an HTTP/1.1 connection.
///
/// The request is written in full, then the response head is read, then the payload is
/// streamed to the caller chunk by chunk. The connection is consumed: it serves exactly one
/// exchange.
///
/// # Type Parameters
///
/// * `R`: The async readable half
/// * `W`: The async writable half
#[derive(Debug)]
pub struct ClientConnection<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    framed_write: FramedWrite<W, RequestEncoder>,
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, method: &Method) -> Self {
        let decoder = ResponseDecoder::new(*method == Method::HEAD);
        Self {
            framed_read: FramedRead::with_capacity(reader, decoder, READ_CAPACITY),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
        }
    }

    /// Sends `request` and reads back the response.
    ///
    /// Every payload chunk is passed to `on_data` in arrival order before this returns the head.
    pub async fn exchange<F>(mut self, request: Request<Bytes>, mut on_data: F) -> Result<ResponseHead, TransportError>
    where
        F: FnMut(Bytes),
    {
        // send flushes the underlying IO
        self.framed_write.send(request).await?;
        trace!("request sent, waiting for response head");

        let head = match self.framed_read.next().await {
            Some(Ok(Message::Header((head, payload_size)))) => {
                trace!(status = %head.status(), ?payload_size, "received response head");
                head
            }
            Some(Ok(Message::Payload(_))) => {
                error!("received payload before response head");
                return Err(ParseError::invalid_body("payload before response head").into());
            }
            Some(Err(e)) => {
                error!(cause = %e, "can't read response head");
                return Err(e.into());
            }
            None => return Err(TransportError::ConnectionClosed),
        };

        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => on_data(bytes),
                Some(Ok(Message::Payload(PayloadItem::Eof))) => return Ok(head),
                Some(Ok(Message::Header(_))) => {
                    return Err(ParseError::invalid_header("second response head inside one exchange").into());
                }
                Some(Err(e)) => {
                    error!(cause = %e, "can't read response payload");
                    return Err(e.into());
                }
                None => return Err(TransportError::ConnectionClosed),
            }
        }
    }
}
