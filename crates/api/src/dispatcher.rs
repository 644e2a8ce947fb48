//! Sending requests and turning completed tasks into typed results.

use bytes::{Bytes, BytesMut};
use micro_api_transport::protocol::{ResponseHead, TransportError};
use micro_api_transport::session::DataTask;
use tracing::{debug, warn};

use crate::api::Api;
use crate::codec::{BodyParser, ResponseBodyParser};
use crate::error::ApiError;
use crate::registry::ApiPair;
use crate::request::Request;

type Completion = Box<dyn FnOnce(Bytes, Result<ResponseHead, TransportError>) + Send>;

/// State of one in-flight call: the received payload and what to do once the task ends.
pub(crate) struct CallContext {
    buffer: BytesMut,
    completion: Completion,
}

impl CallContext {
    fn new<F>(completion: F) -> Self
    where
        F: FnOnce(Bytes, Result<ResponseHead, TransportError>) + Send + 'static,
    {
        Self { buffer: BytesMut::new(), completion: Box::new(completion) }
    }

    pub(crate) fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub(crate) fn complete(self, result: Result<ResponseHead, TransportError>) {
        (self.completion)(self.buffer.freeze(), result);
    }
}

/// Sends `request` on its backend's session.
///
/// `handler` is called exactly once, on the backend's callback queue. When the request
/// cannot be built no task is created, the handler receives [`ApiError::RequestBuild`] and
/// `None` is returned. Otherwise the running task is returned; cancelling it completes the
/// call with [`ApiError::Connection`] carrying [`TransportError::Cancelled`].
pub fn send<R, F>(request: R, handler: F) -> Option<DataTask>
where
    R: Request,
    F: FnOnce(Result<R::Response, ApiError>) + Send + 'static,
{
    let ApiPair { instance, session } = <R::Api as Api>::pair();
    let callback_queue = instance.config().callback_queue();

    let http_request = match request.http_request() {
        Ok(http_request) => http_request,
        Err(e) => {
            warn!(backend = %instance.backend(), cause = %e, "failed to build request");
            callback_queue.dispatch(move || handler(Err(e.into())));
            return None;
        }
    };

    let parser = instance.config().response_body_parser();
    let task = session.data_task(http_request);
    let task_id = task.id();

    // registered before resume so no data event can miss the context
    instance.register(
        task_id,
        CallContext::new(move |body, result| {
            let outcome = complete(&request, &parser, &body, result);
            debug!(task = %task_id, ok = outcome.is_ok(), "call completed");
            callback_queue.dispatch(move || handler(outcome));
        }),
    );

    task.resume();
    Some(task)
}

/// Classifies a finished task: transport failure, then HTTP status, then body parsing, then
/// the request's own mapping.
fn complete<R: Request>(
    request: &R,
    parser: &ResponseBodyParser,
    body: &[u8],
    result: Result<ResponseHead, TransportError>,
) -> Result<R::Response, ApiError> {
    let head = result?;

    let status = head.status();
    if !status.is_success() {
        debug!(%status, discarded = body.len(), "status represents error");
        return Err(ApiError::Status { status });
    }

    let object = parser.parse_data(body)?;
    request.response_from_object(object).ok_or(ApiError::ResponseMapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use http::{Response, StatusCode};
    use serde_json::{Value, json};

    #[derive(Default)]
    struct Backend;

    impl ApiConfig for Backend {
        fn base_url(&self) -> &str {
            "http://backend.invalid"
        }
    }

    struct ObjectRequest;

    impl Request for ObjectRequest {
        type Api = Backend;
        type Response = Value;

        fn path(&self) -> String {
            "/".to_owned()
        }

        fn response_from_object(&self, object: Value) -> Option<Value> {
            object.is_object().then_some(object)
        }
    }

    fn head(status: StatusCode) -> Result<ResponseHead, TransportError> {
        let mut head = Response::new(());
        *head.status_mut() = status;
        Ok(head)
    }

    fn run(body: &[u8], result: Result<ResponseHead, TransportError>) -> Result<Value, ApiError> {
        complete(&ObjectRequest, &ResponseBodyParser::Json, body, result)
    }

    #[test]
    fn success() {
        assert_eq!(run(br#"{"key":"value"}"#, head(StatusCode::OK)).unwrap(), json!({"key": "value"}));
        assert!(run(b"{}", head(StatusCode::NO_CONTENT)).is_ok());
    }

    #[test]
    fn transport_error_wins() {
        let error = run(b"{}", Err(TransportError::Cancelled)).unwrap_err();
        assert!(matches!(error, ApiError::Connection { source: TransportError::Cancelled }));
    }

    #[test]
    fn status_outside_2xx_discards_body() {
        let error = run(br#"{"key":"value"}"#, head(StatusCode::BAD_REQUEST)).unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::BAD_REQUEST));

        let redirect = run(b"", head(StatusCode::MOVED_PERMANENTLY)).unwrap_err();
        assert_eq!(redirect.code(), 301);
    }

    #[test]
    fn broken_body_is_decode_error() {
        let error = run(br#"{"broken": "json}"#, head(StatusCode::OK)).unwrap_err();
        assert!(matches!(error, ApiError::Decode { .. }));
    }

    #[test]
    fn rejected_shape_is_mapping_error() {
        let error = run(b"[1, 2]", head(StatusCode::OK)).unwrap_err();
        assert!(matches!(error, ApiError::ResponseMapping));
    }

    #[test]
    fn context_accumulates_in_order() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut context = CallContext::new(move |body, result| {
            let _ = tx.send((body, result.is_ok()));
        });
        context.append(b"{\"a\"");
        context.append(b":1}");
        context.complete(head(StatusCode::OK));

        let (body, ok) = rx.recv().unwrap();
        assert_eq!(body, Bytes::from_static(b"{\"a\":1}"));
        assert!(ok);
    }
}
