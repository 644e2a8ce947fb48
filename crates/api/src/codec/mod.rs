//! Pluggable request body builders and response body parsers.
//!
//! A [`BodyBuilder`] turns [`Parameters`] into a request body and names the `Content-Type` it
//! produces. A [`BodyParser`] turns response bytes into a generic [`Value`] and names the
//! `Accept` type it expects. JSON and URL-encoded forms are bundled through
//! [`RequestBodyBuilder`] and [`ResponseBodyParser`]; anything else plugs in through their
//! `Custom` variants.

mod error;
mod form;

pub use error::CodecError;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use mime::Mime;
use serde_json::{Map, Value};
use tracing::trace;

/// Structured request parameters: string keys to arbitrary JSON values.
pub type Parameters = Map<String, Value>;

static APPLICATION_JSON: Mime = mime::APPLICATION_JSON;
static APPLICATION_WWW_FORM_URLENCODED: Mime = mime::APPLICATION_WWW_FORM_URLENCODED;

pub trait BodyBuilder: fmt::Debug + Send + Sync {
    fn content_type_header(&self) -> &str;

    fn build_body(&self, parameters: &Parameters) -> Result<Bytes, CodecError>;
}

pub trait BodyParser: fmt::Debug + Send + Sync {
    fn accept_header(&self) -> &str;

    fn parse_data(&self, data: &[u8]) -> Result<Value, CodecError>;
}

#[derive(Debug, Clone)]
pub enum RequestBodyBuilder {
    Json { pretty: bool },
    UrlEncoded,
    Custom(Arc<dyn BodyBuilder>),
}

impl Default for RequestBodyBuilder {
    fn default() -> Self {
        Self::Json { pretty: false }
    }
}

impl BodyBuilder for RequestBodyBuilder {
    fn content_type_header(&self) -> &str {
        match self {
            Self::Json { .. } => APPLICATION_JSON.as_ref(),
            Self::UrlEncoded => APPLICATION_WWW_FORM_URLENCODED.as_ref(),
            Self::Custom(builder) => builder.content_type_header(),
        }
    }

    fn build_body(&self, parameters: &Parameters) -> Result<Bytes, CodecError> {
        let body = match self {
            Self::Json { pretty: false } => serde_json::to_vec(parameters).map_err(|source| CodecError::JsonSerialize { source })?,
            Self::Json { pretty: true } => {
                serde_json::to_vec_pretty(parameters).map_err(|source| CodecError::JsonSerialize { source })?
            }
            Self::UrlEncoded => form::encode(parameters)?.into_bytes(),
            Self::Custom(builder) => return builder.build_body(parameters),
        };
        trace!(len = body.len(), "built request body");
        Ok(Bytes::from(body))
    }
}

#[derive(Debug, Clone, Default)]
pub enum ResponseBodyParser {
    #[default]
    Json,
    UrlEncoded,
    Custom(Arc<dyn BodyParser>),
}

impl BodyParser for ResponseBodyParser {
    fn accept_header(&self) -> &str {
        match self {
            Self::Json => APPLICATION_JSON.as_ref(),
            Self::UrlEncoded => APPLICATION_WWW_FORM_URLENCODED.as_ref(),
            Self::Custom(parser) => parser.accept_header(),
        }
    }

    fn parse_data(&self, data: &[u8]) -> Result<Value, CodecError> {
        match self {
            Self::Json => serde_json::from_slice(data).map_err(|source| CodecError::JsonParse { source }),
            Self::UrlEncoded => form::decode(data),
            Self::Custom(parser) => parser.parse_data(data),
        }
    }
}

/// URL-encodes `parameters` for use as a query string.
pub fn query_string(parameters: &Parameters) -> Result<String, CodecError> {
    form::encode(parameters)
}
