//! Head codecs for the client side of an HTTP/1.1 exchange.
//!
//! # Components
//!
//! - [`HeaderEncoder`]: writes the request line and request headers
//!   - origin-form target, `Host` from the URI authority
//!   - framing headers matching the payload that follows
//!
//! - [`HeaderDecoder`]: parses the status line and response headers
//!   - header count and head size limits
//!   - payload framing of the body that follows, `HEAD`-aware

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
