//! Typed HTTP requests on top of a shared, per-backend session.
//!
//! A backend is any `Default` type implementing [`ApiConfig`]; it names a base URL and,
//! optionally, its body codecs, session configuration and callback queue. Requests are
//! types implementing [`Request`]: they describe one call and map the parsed response body
//! to a typed value. [`Api::send`] runs the call and delivers a
//! `Result<Response, ApiError>` to the handler exactly once.
//!
//! # Example
//!
//! ```no_run
//! use micro_api::{Api, ApiConfig, Parameters, Request};
//! use http::Method;
//! use serde_json::{Value, json};
//!
//! #[derive(Default)]
//! struct Example;
//!
//! impl ApiConfig for Example {
//!     fn base_url(&self) -> &str {
//!         "http://127.0.0.1:8080/v1"
//!     }
//! }
//!
//! struct CreateUser {
//!     name: String,
//! }
//!
//! impl Request for CreateUser {
//!     type Api = Example;
//!     type Response = u64;
//!
//!     fn method(&self) -> Method {
//!         Method::POST
//!     }
//!
//!     fn path(&self) -> String {
//!         "/users".to_owned()
//!     }
//!
//!     fn parameters(&self) -> Parameters {
//!         json!({ "name": self.name }).as_object().cloned().unwrap_or_default()
//!     }
//!
//!     fn response_from_object(&self, object: Value) -> Option<u64> {
//!         object.get("id")?.as_u64()
//!     }
//! }
//!
//! Example::send(CreateUser { name: "micro".to_owned() }, |result| match result {
//!     Ok(id) => println!("created user {id}"),
//!     Err(e) => println!("failed: {e} ({} {})", e.domain(), e.code()),
//! });
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: body builders and parsers
//! - [`Request`]: the per-call contract
//! - [`Api`] / [`ApiConfig`] / [`ApiRoot`]: per-backend configuration, URL and body
//!   construction, and the session delegate
//! - [`ApiRegistry`]: the process-wide (instance, session) pairs
//! - [`send`]: the dispatcher
//! - [`CallbackQueue`]: where handlers run

pub mod codec;

mod api;
mod dispatcher;
mod error;
mod queue;
mod registry;
mod request;

pub use api::{Api, ApiConfig, ApiRoot, build_request};
pub use codec::{BodyBuilder, BodyParser, CodecError, Parameters, RequestBodyBuilder, ResponseBodyParser};
pub use dispatcher::send;
pub use error::{ApiError, BuildError, ErrorDomain};
pub use queue::CallbackQueue;
pub use registry::{ApiPair, ApiRegistry, BackendId, registry};
pub use request::Request;

pub use micro_api_transport as transport;
