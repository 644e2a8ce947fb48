//! Client side HTTP/1.1 codecs.
//!
//! - [`RequestEncoder`] serializes an in-memory `http::Request<Bytes>` onto the wire
//! - [`ResponseDecoder`] turns the bytes read back into a response head followed by
//!   payload chunks, choosing the payload framing from the head
//!
//! Both plug into `tokio_util::codec::{FramedWrite, FramedRead}`.

mod body;
mod header;
mod request_encoder;
mod response_decoder;

pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
