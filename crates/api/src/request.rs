use bytes::Bytes;
use http::Method;
use serde_json::Value;

use crate::api::Api;
use crate::codec::Parameters;
use crate::error::BuildError;

/// A typed description of one call against the backend `Self::Api`.
///
/// Implementors describe the call through [`method`](Request::method),
/// [`path`](Request::path) and [`parameters`](Request::parameters), and map the parsed
/// response body to [`Response`](Request::Response) in
/// [`response_from_object`](Request::response_from_object).
///
/// ```no_run
/// use micro_api::{Api, ApiConfig, Request};
/// use serde_json::Value;
///
/// #[derive(Default)]
/// struct GitHub;
///
/// impl ApiConfig for GitHub {
///     fn base_url(&self) -> &str {
///         "http://api.github.com"
///     }
/// }
///
/// struct Zen;
///
/// impl Request for Zen {
///     type Api = GitHub;
///     type Response = String;
///
///     fn path(&self) -> String {
///         "/zen".to_owned()
///     }
///
///     fn response_from_object(&self, object: Value) -> Option<String> {
///         object.as_str().map(str::to_owned)
///     }
/// }
///
/// GitHub::send(Zen, |result| println!("{result:?}"));
/// ```
pub trait Request: Send + 'static {
    type Api: Api;
    type Response: Send + 'static;

    fn method(&self) -> Method {
        Method::GET
    }

    fn path(&self) -> String;

    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// The HTTP request this call sends. Fails when the URL or the body cannot be built.
    fn http_request(&self) -> Result<http::Request<Bytes>, BuildError> {
        <Self::Api as Api>::build_request(self.method(), &self.path(), &self.parameters())
    }

    /// Maps the parsed body to the typed response; `None` means the body did not have the
    /// expected shape.
    fn response_from_object(&self, object: Value) -> Option<Self::Response>;
}
