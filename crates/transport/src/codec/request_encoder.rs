//! Encoder for complete HTTP/1.1 requests whose body is already in memory.

use bytes::{BufMut, Bytes, BytesMut};
use http::Request;
use tokio_util::codec::Encoder;

use crate::codec::header::HeaderEncoder;
use crate::protocol::{PayloadSize, SendError};

/// Writes the request head followed by the whole body.
#[derive(Debug, Default)]
pub struct RequestEncoder {
    header_encoder: HeaderEncoder,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder<Request<Bytes>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Request<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (parts, body) = item.into_parts();
        let payload_size = PayloadSize::new_length(body.len() as u64);

        self.header_encoder.encode((Request::from_parts(parts, ()), payload_size), dst)?;
        dst.reserve(body.len());
        dst.put(body);
        Ok(())
    }
}
