//! Protocol types exchanged between the codecs, the connection and the session.
//!
//! - [`Message`] / [`PayloadItem`] / [`PayloadSize`]: what the response decoder yields
//! - [`ResponseHead`]: status line and headers handed to session delegates
//! - [`TransportError`]: the single error a data task completes with, wrapping
//!   [`ParseError`] (response side) and [`SendError`] (request side)

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
