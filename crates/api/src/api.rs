//! Backend configuration and request construction.
//!
//! A backend is a type implementing [`ApiConfig`] plus `Default`. Such a type automatically
//! implements [`Api`], which gives it the shared [`ApiRoot`] / [`Session`] pair, the URL and
//! body construction used by its requests, and [`send`](Api::send).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, Uri, header};
use micro_api_transport::protocol::{ResponseHead, TransportError};
use micro_api_transport::session::{DataTask, Session, SessionConfig, SessionDelegate, TaskId};
use micro_api_transport::utils::lock;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tokio::runtime::Handle;
use tracing::{trace, warn};

use crate::codec::{self, BodyBuilder, BodyParser, Parameters, RequestBodyBuilder, ResponseBodyParser};
use crate::dispatcher::{self, CallContext};
use crate::error::{ApiError, BuildError};
use crate::queue::CallbackQueue;
use crate::registry::{ApiPair, BackendId, registry};
use crate::request::Request;

/// Per-backend configuration.
///
/// Only [`base_url`](ApiConfig::base_url) has to be provided.
pub trait ApiConfig: Send + Sync + 'static {
    /// Absolute base URL every request path is appended to, e.g. `https://api.example.com/v1`.
    fn base_url(&self) -> &str;

    fn request_body_builder(&self) -> RequestBodyBuilder {
        RequestBodyBuilder::default()
    }

    fn response_body_parser(&self) -> ResponseBodyParser {
        ResponseBodyParser::default()
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
    }

    /// Runtime the session's tasks and delegate callbacks run on; `None` selects the shared
    /// `micro-api-io` runtime.
    fn delegate_queue(&self) -> Option<Handle> {
        None
    }

    /// Queue completion handlers are delivered on.
    fn callback_queue(&self) -> CallbackQueue {
        CallbackQueue::main()
    }
}

/// Operations every backend gets for free.
pub trait Api: ApiConfig + Default {
    /// The process-wide (instance, session) pair of this backend, created on first use.
    fn pair() -> ApiPair {
        registry().get_or_create::<Self>()
    }

    fn instance() -> Arc<ApiRoot> {
        Self::pair().instance
    }

    fn session() -> Arc<Session> {
        Self::pair().session
    }

    /// Builds an HTTP request against this backend, see [`build_request`].
    fn build_request(method: Method, path: &str, parameters: &Parameters) -> Result<http::Request<Bytes>, BuildError> {
        build_request(&Self::default(), method, path, parameters)
    }

    /// Sends `request` and delivers its outcome to `handler` on the backend's callback queue.
    fn send<R, F>(request: R, handler: F) -> Option<DataTask>
    where
        R: Request<Api = Self>,
        F: FnOnce(Result<R::Response, ApiError>) + Send + 'static,
    {
        dispatcher::send(request, handler)
    }
}

impl<T: ApiConfig + Default> Api for T {}

/// Builds the HTTP request for `method` + `path` + `parameters` against `config`.
///
/// - `path` is percent-encoded and appended to the base URL's path as a path segment
/// - `GET`, `HEAD` and `DELETE` carry `parameters` URL-encoded in the query; an empty mapping
///   adds no query at all
/// - every other method carries them in the body, encoded by the configured builder
/// - `Content-Type` and `Accept` always come from the configured builder and parser
pub fn build_request(
    config: &dyn ApiConfig,
    method: Method,
    path: &str,
    parameters: &Parameters,
) -> Result<http::Request<Bytes>, BuildError> {
    let base_url = config.base_url();
    let base: Uri = base_url.parse().map_err(|e| BuildError::invalid_base_url(base_url, e))?;
    let (Some(scheme), Some(authority)) = (base.scheme(), base.authority()) else {
        return Err(BuildError::invalid_base_url(base_url, "base url needs a scheme and a host"));
    };

    let builder = config.request_body_builder();
    let parser = config.response_body_parser();

    let (query, body) = if carries_query(&method) {
        let query = codec::query_string(parameters).map_err(|source| BuildError::Query { source })?;
        (Some(query).filter(|q| !q.is_empty()), Bytes::new())
    } else {
        let body = builder.build_body(parameters).map_err(|source| BuildError::Body { source })?;
        (base.query().map(str::to_owned), body)
    };

    let mut url = format!("{scheme}://{authority}{}", join_path(base.path(), &encode_path(path)));
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }
    let uri: Uri = url.parse().map_err(|e| BuildError::invalid_url(&url, e))?;
    trace!(%method, %uri, body_len = body.len(), "built request");

    let request = http::Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, builder.content_type_header())
        .header(header::ACCEPT, parser.accept_header())
        .body(body)?;
    Ok(request)
}

fn carries_query(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
}

/// Characters escaped inside one path segment. `path` is plain text, so `%` is escaped too.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encodes every `/`-separated segment of `path`, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/').map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string()).collect::<Vec<_>>().join("/")
}

/// Joins two URL paths without doubling or dropping the `/` between them.
fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_owned(),
        (false, true) => base.to_owned(),
        _ => format!("{base}/{path}"),
    }
}

/// The shared instance of one backend, and the delegate of its session.
///
/// It keeps the context of every in-flight call keyed by task, fills the call's buffer as
/// data arrives and hands the buffer to the call once its task completes.
pub struct ApiRoot {
    backend: BackendId,
    config: Arc<dyn ApiConfig>,
    calls: Mutex<HashMap<TaskId, CallContext>>,
}

impl ApiRoot {
    pub(crate) fn new(backend: BackendId, config: Arc<dyn ApiConfig>) -> Self {
        Self { backend, config, calls: Mutex::new(HashMap::new()) }
    }

    pub fn backend(&self) -> &BackendId {
        &self.backend
    }

    pub fn config(&self) -> &dyn ApiConfig {
        self.config.as_ref()
    }

    /// Number of calls started and not yet completed.
    pub fn in_flight(&self) -> usize {
        lock(&self.calls).len()
    }

    pub(crate) fn register(&self, task_id: TaskId, context: CallContext) {
        lock(&self.calls).insert(task_id, context);
    }
}

impl SessionDelegate for ApiRoot {
    fn did_receive_data(&self, task_id: TaskId, data: Bytes) {
        match lock(&self.calls).get_mut(&task_id) {
            Some(context) => context.append(&data),
            None => warn!(backend = %self.backend, task = %task_id, "data for unknown task"),
        }
    }

    fn did_complete(&self, task_id: TaskId, result: Result<ResponseHead, TransportError>) {
        let context = lock(&self.calls).remove(&task_id);
        match context {
            Some(context) => context.complete(result),
            None => warn!(backend = %self.backend, task = %task_id, "completion for unknown task"),
        }
    }
}

impl fmt::Debug for ApiRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRoot").field("backend", &self.backend).field("in_flight", &self.in_flight()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Backend {
        base_url: &'static str,
        builder: RequestBodyBuilder,
    }

    impl ApiConfig for Backend {
        fn base_url(&self) -> &str {
            self.base_url
        }

        fn request_body_builder(&self) -> RequestBodyBuilder {
            self.builder.clone()
        }
    }

    fn backend(base_url: &'static str) -> Backend {
        Backend { base_url, builder: RequestBodyBuilder::default() }
    }

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn get_puts_parameters_in_query() {
        let request =
            build_request(&backend("https://api.example.com"), Method::GET, "/search", &params(json!({"q": "x y"}))).unwrap();

        assert_eq!(request.uri().to_string(), "https://api.example.com/search?q=x%20y");
        assert!(request.body().is_empty());
        assert_eq!(request.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(request.headers()[header::ACCEPT], "application/json");
    }

    #[test]
    fn empty_parameters_add_no_query() {
        let request = build_request(&backend("https://api.example.com"), Method::DELETE, "users/1", &Parameters::new()).unwrap();
        assert_eq!(request.uri().to_string(), "https://api.example.com/users/1");
    }

    #[test]
    fn post_uses_body_builder() {
        let parameters = params(json!({"name": "n"}));

        let json = build_request(&backend("http://localhost:8080/v1/"), Method::POST, "/users", &parameters).unwrap();
        assert_eq!(json.uri().to_string(), "http://localhost:8080/v1/users");
        assert_eq!(json.body().as_ref(), br#"{"name":"n"}"#);

        let form_backend = Backend { base_url: "http://localhost:8080/v1", builder: RequestBodyBuilder::UrlEncoded };
        let form = build_request(&form_backend, Method::PUT, "users", &parameters).unwrap();
        assert_eq!(form.body().as_ref(), b"name=n");
        assert_eq!(form.headers()[header::CONTENT_TYPE], "application/x-www-form-urlencoded");
    }

    #[test]
    fn joins_paths_as_segments() {
        assert_eq!(join_path("/", "/"), "/");
        assert_eq!(join_path("", "search"), "/search");
        assert_eq!(join_path("/v1/", "/users"), "/v1/users");
        assert_eq!(join_path("/v1", ""), "/v1");
    }

    #[test]
    fn rejects_relative_base_url() {
        let error = build_request(&backend("/relative"), Method::GET, "/", &Parameters::new()).unwrap_err();
        assert!(matches!(error, BuildError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn body_failure_fails_the_build() {
        let form_backend = Backend { base_url: "https://api.example.com", builder: RequestBodyBuilder::UrlEncoded };
        let error = build_request(&form_backend, Method::POST, "/", &params(json!({"list": [1]}))).unwrap_err();
        assert!(matches!(error, BuildError::Body { .. }));
    }

    #[test]
    fn path_is_percent_encoded() {
        let request = build_request(&backend("https://api.example.com/v1"), Method::GET, "/users/José Doe", &Parameters::new()).unwrap();
        assert_eq!(request.uri().path(), "/v1/users/Jos%C3%A9%20Doe");

        let request = build_request(&backend("https://api.example.com"), Method::GET, "files/50%off?#", &Parameters::new()).unwrap();
        assert_eq!(request.uri().to_string(), "https://api.example.com/files/50%25off%3F%23");
    }

    #[test]
    fn encode_path_keeps_separators() {
        assert_eq!(encode_path("/a b/c/"), "/a%20b/c/");
        assert_eq!(encode_path("plain-path_1.json"), "plain-path_1.json");
    }
}
