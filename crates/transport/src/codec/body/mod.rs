//! Response payload decoding.
//!
//! # Components
//!
//! - `ChunkedDecoder`: `Transfer-Encoding: chunked` payloads
//!   - chunk extensions and trailers are validated and dropped
//!   - chunk sizes are checked for overflow
//! - `LengthDecoder`: `Content-Length` payloads
//!   - stops at the announced length and leaves later bytes in the buffer
//! - [`PayloadDecoder`]: picks one of the above, or reads until the peer closes
//!
//! Every decoder yields [`PayloadItem::Chunk`](crate::protocol::PayloadItem) values followed by
//! exactly one `Eof`. Hitting the end of the stream before the framing says the payload is
//! complete is an error, except for until-close payloads where it is the framing.

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub use payload_decoder::PayloadDecoder;
