use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a transport while running one data task.
///
/// Each variant carries a stable numeric [`code`](TransportError::code) so callers can
/// branch on it without matching on the message text.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("task was cancelled")]
    Cancelled,

    #[error("request timed out after {timeout:?}")]
    TimedOut { timeout: Duration },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("unsupported url scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("could not connect to {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },

    #[error("send request error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("bad response: {source}")]
    Response {
        #[from]
        source: ParseError,
    },

    #[error("connection closed before the response completed")]
    ConnectionClosed,

    #[error("task aborted: {reason}")]
    Aborted { reason: String },
}

impl TransportError {
    pub fn invalid_request<S: ToString>(str: S) -> Self {
        Self::InvalidRequest { reason: str.to_string() }
    }

    pub fn unsupported_scheme<S: ToString>(scheme: S) -> Self {
        Self::UnsupportedScheme { scheme: scheme.to_string() }
    }

    pub fn connect<S: ToString>(authority: S, source: io::Error) -> Self {
        Self::Connect { authority: authority.to_string(), source }
    }

    pub fn aborted<S: ToString>(reason: S) -> Self {
        Self::Aborted { reason: reason.to_string() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Stable numeric code of this error inside the transport error domain.
    pub fn code(&self) -> i64 {
        match self {
            Self::Aborted { .. } => -1,
            Self::Cancelled => -999,
            Self::InvalidRequest { .. } => -1000,
            Self::TimedOut { .. } => -1001,
            Self::UnsupportedScheme { .. } => -1002,
            Self::Connect { .. } => -1004,
            Self::Send { .. } | Self::ConnectionClosed => -1005,
            Self::Response { .. } => -1011,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http status code")]
    InvalidStatus,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid request head: {reason}")]
    InvalidHead { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_head<S: ToString>(str: S) -> Self {
        Self::InvalidHead { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
