use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use http::{Method, Response, StatusCode};
use micro_api::transport::protocol::{ResponseHead, TransportError};
use micro_api::transport::session::{DataSink, Exchange, SessionConfig, TaskState};
use micro_api::{Api, ApiConfig, ApiError, BuildError, CallbackQueue, ErrorDomain, Parameters, Request};
use once_cell::sync::Lazy;
use serde_json::{Map, Value, json};
use tokio::sync::oneshot;

/// Answers according to the request path, without touching the network.
struct Scripted;

fn head(status: StatusCode) -> ResponseHead {
    let mut head = Response::new(());
    *head.status_mut() = status;
    head
}

#[async_trait]
impl Exchange for Scripted {
    async fn exchange(&self, request: http::Request<Bytes>, sink: &mut DataSink) -> Result<ResponseHead, TransportError> {
        match request.uri().path() {
            "/success" => {
                sink.receive(Bytes::from_static(b"{\"key\":"));
                sink.receive(Bytes::from_static(b"\"value\"}"));
                Ok(head(StatusCode::OK))
            }
            "/timeout" => Err(TransportError::TimedOut { timeout: Duration::from_secs(60) }),
            "/status" => {
                sink.receive(Bytes::from_static(br#"{"key":"value"}"#));
                Ok(head(StatusCode::BAD_REQUEST))
            }
            "/broken" => {
                sink.receive(Bytes::from_static(br#"{"broken": "json}"#));
                Ok(head(StatusCode::OK))
            }
            "/array" => {
                sink.receive(Bytes::from_static(b"[1, 2, 3]"));
                Ok(head(StatusCode::OK))
            }
            "/slow" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(head(StatusCode::OK))
            }
            "/echo" => {
                let echo = json!({
                    "method": request.method().as_str(),
                    "uri": request.uri().to_string(),
                    "content_type": request.headers()[http::header::CONTENT_TYPE].to_str().unwrap_or_default(),
                    "accept": request.headers()[http::header::ACCEPT].to_str().unwrap_or_default(),
                    "body": String::from_utf8_lossy(request.body()),
                });
                sink.receive(Bytes::from(echo.to_string()));
                Ok(head(StatusCode::OK))
            }
            _ => Ok(head(StatusCode::NOT_FOUND)),
        }
    }
}

#[derive(Default)]
struct MockApi;

impl ApiConfig for MockApi {
    fn base_url(&self) -> &str {
        "https://api.example.com"
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::builder().exchange(Scripted).build()
    }
}

#[derive(Default)]
struct AnotherMockApi;

impl ApiConfig for AnotherMockApi {
    fn base_url(&self) -> &str {
        "https://another.example.com"
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::builder().exchange(Scripted).build()
    }
}

/// Never produces a valid request.
#[derive(Default)]
struct UnconfiguredApi;

impl ApiConfig for UnconfiguredApi {
    fn base_url(&self) -> &str {
        "not a url"
    }
}

#[derive(Default)]
struct ImpatientApi;

impl ApiConfig for ImpatientApi {
    fn base_url(&self) -> &str {
        "https://api.example.com"
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::builder().exchange(Scripted).timeout(Duration::from_millis(50)).build()
    }
}

/// Its exchange panics on every call.
struct Exploding;

#[async_trait]
impl Exchange for Exploding {
    async fn exchange(&self, _request: http::Request<Bytes>, _sink: &mut DataSink) -> Result<ResponseHead, TransportError> {
        panic!("exchange exploded")
    }
}

#[derive(Default)]
struct FragileApi;

impl ApiConfig for FragileApi {
    fn base_url(&self) -> &str {
        "https://api.example.com"
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::builder().exchange(Exploding).build()
    }
}

static CUSTOM_QUEUE: Lazy<CallbackQueue> = Lazy::new(|| CallbackQueue::new("custom-callbacks").unwrap());

#[derive(Default)]
struct CustomQueueApi;

impl ApiConfig for CustomQueueApi {
    fn base_url(&self) -> &str {
        "https://api.example.com"
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::builder().exchange(Scripted).build()
    }

    fn callback_queue(&self) -> CallbackQueue {
        CUSTOM_QUEUE.clone()
    }
}

/// `GET <path>` expecting a JSON object.
struct Get<A> {
    path: &'static str,
    api: std::marker::PhantomData<fn() -> A>,
}

fn get<A>(path: &'static str) -> Get<A> {
    Get { path, api: std::marker::PhantomData }
}

impl<A: Api> Request for Get<A> {
    type Api = A;
    type Response = Map<String, Value>;

    fn path(&self) -> String {
        self.path.to_owned()
    }

    fn response_from_object(&self, object: Value) -> Option<Self::Response> {
        object.as_object().cloned()
    }
}

struct CreateUser {
    name: &'static str,
}

impl Request for CreateUser {
    type Api = MockApi;
    type Response = Value;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        "/echo".to_owned()
    }

    fn parameters(&self) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert("name".to_owned(), Value::from(self.name));
        parameters
    }

    fn response_from_object(&self, object: Value) -> Option<Value> {
        Some(object)
    }
}

struct Delivery<T> {
    result: Result<T, ApiError>,
    thread: Option<String>,
}

async fn send_and_wait<R: Request>(request: R) -> Delivery<R::Response> {
    let (tx, rx) = oneshot::channel();
    let _task = micro_api::send(request, move |result| {
        let _ = tx.send(Delivery { result, thread: thread::current().name().map(str::to_owned) });
    });

    tokio::time::timeout(Duration::from_secs(1), rx)
        .await
        .expect("callback was not delivered in time")
        .expect("callback was dropped")
}

#[test]
fn different_sessions_are_created_for_each_backend() {
    assert!(!Arc::ptr_eq(&MockApi::session(), &AnotherMockApi::session()));
    assert!(!Arc::ptr_eq(&MockApi::instance(), &AnotherMockApi::instance()));
}

#[test]
fn same_session_is_used_within_a_backend() {
    assert!(Arc::ptr_eq(&MockApi::session(), &MockApi::session()));
    assert!(Arc::ptr_eq(&AnotherMockApi::session(), &AnotherMockApi::session()));
}

#[test]
fn session_delegate_is_the_backend_instance() {
    assert!(std::ptr::addr_eq(Arc::as_ptr(MockApi::session().delegate()), Arc::as_ptr(&MockApi::instance())));
    assert!(std::ptr::addr_eq(Arc::as_ptr(AnotherMockApi::session().delegate()), Arc::as_ptr(&AnotherMockApi::instance())));
    assert!(!std::ptr::addr_eq(Arc::as_ptr(MockApi::session().delegate()), Arc::as_ptr(&AnotherMockApi::instance())));
}

#[tokio::test]
async fn success() {
    let delivery = send_and_wait(get::<MockApi>("/success")).await;

    let response = delivery.result.unwrap();
    assert_eq!(Value::Object(response), json!({"key": "value"}));
    assert_eq!(delivery.thread.as_deref(), Some("micro-api-main"));
}

#[tokio::test]
async fn failure_of_connection() {
    let error = send_and_wait(get::<MockApi>("/timeout")).await.result.unwrap_err();

    assert!(matches!(error, ApiError::Connection { source: TransportError::TimedOut { .. } }));
    assert_eq!(error.domain(), ErrorDomain::Transport);
    assert_eq!(error.code(), -1001);
}

#[tokio::test]
async fn failure_of_response_status_code() {
    let error = send_and_wait(get::<MockApi>("/status")).await.result.unwrap_err();

    assert_eq!(error.domain(), ErrorDomain::Api);
    assert_eq!(error.code(), 400);
    assert_eq!(error.status(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn failure_of_decoding_response_body() {
    let error = send_and_wait(get::<MockApi>("/broken")).await.result.unwrap_err();

    assert!(matches!(error, ApiError::Decode { .. }));
    assert_eq!(error.domain(), ErrorDomain::Codec);
}

#[tokio::test]
async fn failure_of_mapping_response_object() {
    let error = send_and_wait(get::<MockApi>("/array")).await.result.unwrap_err();

    assert!(matches!(error, ApiError::ResponseMapping));
    assert_eq!((error.domain(), error.code()), (ErrorDomain::Api, 0));
}

#[tokio::test]
async fn failure_of_building_request() {
    let (tx, rx) = oneshot::channel();
    let task = UnconfiguredApi::send(get::<UnconfiguredApi>("/"), move |result| {
        let _ = tx.send((result, thread::current().name().map(str::to_owned)));
    });
    assert!(task.is_none());

    let (result, thread) = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
    let error = result.unwrap_err();
    assert!(matches!(error, ApiError::RequestBuild { source: BuildError::InvalidBaseUrl { .. } }));
    assert_eq!((error.domain(), error.code()), (ErrorDomain::Api, 0));
    assert_eq!(thread.as_deref(), Some("micro-api-main"));
}

#[tokio::test]
async fn cancelled_task_delivers_one_connection_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();

    let counter = Arc::clone(&calls);
    let task = MockApi::send(get::<MockApi>("/slow"), move |result| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(result);
    })
    .unwrap();
    task.cancel();

    let error = tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(error, ApiError::Connection { source: TransportError::Cancelled }));
    assert_eq!(error.code(), -999);

    task.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(task.state(), TaskState::Completed);
}

#[tokio::test]
async fn session_timeout_is_a_connection_error() {
    let error = send_and_wait(get::<ImpatientApi>("/slow")).await.result.unwrap_err();
    assert!(matches!(error, ApiError::Connection { source: TransportError::TimedOut { .. } }));
}

#[tokio::test]
async fn panicking_exchange_still_delivers_once() {
    let delivery = send_and_wait(get::<FragileApi>("/success")).await;

    let error = delivery.result.unwrap_err();
    assert!(matches!(error, ApiError::Connection { source: TransportError::Aborted { .. } }));
    assert_eq!((error.domain(), error.code()), (ErrorDomain::Transport, -1));
    assert_eq!(delivery.thread.as_deref(), Some("micro-api-main"));
    assert_eq!(FragileApi::instance().in_flight(), 0);
}

#[tokio::test]
async fn handlers_run_on_the_configured_queue() {
    let delivery = send_and_wait(get::<CustomQueueApi>("/success")).await;
    assert!(delivery.result.is_ok());
    assert_eq!(delivery.thread.as_deref(), Some("custom-callbacks"));
}

#[tokio::test]
async fn post_sends_json_body() {
    let echo = send_and_wait(CreateUser { name: "micro api" }).await.result.unwrap();

    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["uri"], "https://api.example.com/echo");
    assert_eq!(echo["content_type"], "application/json");
    assert_eq!(echo["accept"], "application/json");
    assert_eq!(echo["body"], r#"{"name":"micro api"}"#);
}

#[tokio::test]
async fn concurrent_calls_are_independent() {
    let deliveries = join_all(vec![
        send_and_wait(get::<AnotherMockApi>("/success")),
        send_and_wait(get::<AnotherMockApi>("/status")),
        send_and_wait(get::<AnotherMockApi>("/success")),
        send_and_wait(get::<AnotherMockApi>("/broken")),
    ])
    .await;

    assert!(deliveries[0].result.is_ok());
    assert_eq!(deliveries[1].result.as_ref().unwrap_err().code(), 400);
    assert!(deliveries[2].result.is_ok());
    assert!(matches!(deliveries[3].result, Err(ApiError::Decode { .. })));
    assert_eq!(AnotherMockApi::instance().in_flight(), 0);
}

#[test]
fn get_url_construction() {
    let mut parameters = Parameters::new();
    parameters.insert("q".to_owned(), Value::from("x y"));

    let request = MockApi::build_request(Method::GET, "/search", &parameters).unwrap();

    assert_eq!(request.method(), Method::GET);
    assert_eq!(request.uri().to_string(), "https://api.example.com/search?q=x%20y");
    assert!(request.body().is_empty());
}
