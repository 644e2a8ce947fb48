use std::fmt;

use http::StatusCode;
use micro_api_transport::protocol::TransportError;
use thiserror::Error;

use crate::codec::CodecError;

/// Namespace an error [`code`](ApiError::code) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    /// request building, HTTP status and response mapping failures
    Api,
    /// failures reported by the session, see [`TransportError::code`]
    Transport,
    /// body encoding and decoding failures, see [`CodecError::code`]
    Codec,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorDomain::Api => "micro-api",
            ErrorDomain::Transport => "micro-api.transport",
            ErrorDomain::Codec => "micro-api.codec",
        };
        f.write_str(name)
    }
}

/// Why a request could not be turned into an HTTP call.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid request url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to encode query: {source}")]
    Query { source: CodecError },

    #[error("failed to build body: {source}")]
    Body { source: CodecError },

    #[error("invalid request: {source}")]
    Http {
        #[from]
        source: http::Error,
    },
}

impl BuildError {
    pub fn invalid_base_url<U: ToString, S: ToString>(url: U, reason: S) -> Self {
        Self::InvalidBaseUrl { url: url.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_url<U: ToString, S: ToString>(url: U, reason: S) -> Self {
        Self::InvalidUrl { url: url.to_string(), reason: reason.to_string() }
    }
}

/// The failure side of every completed call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build request: {source}")]
    RequestBuild {
        #[from]
        source: BuildError,
    },

    #[error("connection error: {source}")]
    Connection {
        #[from]
        source: TransportError,
    },

    #[error("received status code that represents error: {status}")]
    Status { status: StatusCode },

    #[error("failed to decode response body: {source}")]
    Decode {
        #[from]
        source: CodecError,
    },

    #[error("failed to create model object from raw object")]
    ResponseMapping,
}

impl ApiError {
    pub fn domain(&self) -> ErrorDomain {
        match self {
            Self::RequestBuild { .. } | Self::Status { .. } | Self::ResponseMapping => ErrorDomain::Api,
            Self::Connection { .. } => ErrorDomain::Transport,
            Self::Decode { .. } => ErrorDomain::Codec,
        }
    }

    /// Numeric code inside [`domain`](ApiError::domain): the status for status errors,
    /// `0` for build and mapping failures, the source's own code otherwise.
    pub fn code(&self) -> i64 {
        match self {
            Self::RequestBuild { .. } | Self::ResponseMapping => 0,
            Self::Status { status } => i64::from(status.as_u16()),
            Self::Connection { source } => source.code(),
            Self::Decode { source } => source.code(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }
}
