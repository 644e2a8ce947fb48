//! Response head type shared by the decoder, the sessions and their delegates.
//!
//! The head is the standard `http::Response` with an empty body placeholder:
//! the payload never travels with it, it is streamed to the delegate chunk by chunk.

use http::Response;

/// Status line and headers of a received response.
pub type ResponseHead = Response<()>;
