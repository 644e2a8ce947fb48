use std::error::Error;
use std::str::Utf8Error;

use thiserror::Error;

/// Errors raised while building a request body or parsing a response body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to serialize json: {source}")]
    JsonSerialize { source: serde_json::Error },

    #[error("failed to parse json: {source}")]
    JsonParse { source: serde_json::Error },

    #[error("failed to serialize form: {reason}")]
    FormSerialize { reason: String },

    #[error("failed to parse form: {source}")]
    FormParse { source: serde_urlencoded::de::Error },

    #[error("body is not valid utf-8: {source}")]
    NotUtf8 { source: Utf8Error },

    #[error("custom codec error: {source}")]
    Custom { source: Box<dyn Error + Send + Sync> },
}

impl CodecError {
    pub fn form_serialize<S: ToString>(str: S) -> Self {
        Self::FormSerialize { reason: str.to_string() }
    }

    pub fn custom<E: Into<Box<dyn Error + Send + Sync>>>(e: E) -> Self {
        Self::Custom { source: e.into() }
    }

    /// Stable numeric code of this error inside the codec error domain.
    pub fn code(&self) -> i64 {
        match self {
            Self::JsonSerialize { .. } => 1,
            Self::JsonParse { .. } => 2,
            Self::FormSerialize { .. } => 3,
            Self::FormParse { .. } => 4,
            Self::NotUtf8 { .. } => 5,
            Self::Custom { .. } => 6,
        }
    }
}
