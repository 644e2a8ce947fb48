//! Sends typed requests to a tiny HTTP/1.1 server started in-process.
//!
//! ```text
//! cargo run -p micro-api --example local_users
//! ```

use std::time::Duration;

use http::Method;
use micro_api::{Api, ApiConfig, ApiError, Parameters, Request};
use once_cell::sync::OnceCell;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

static BASE_URL: OnceCell<String> = OnceCell::new();

#[derive(Default)]
struct LocalApi;

impl ApiConfig for LocalApi {
    fn base_url(&self) -> &str {
        BASE_URL.get().map_or("http://127.0.0.1:8080", String::as_str)
    }
}

#[derive(Debug)]
struct User {
    id: u64,
    name: String,
}

struct CreateUser {
    name: String,
}

impl Request for CreateUser {
    type Api = LocalApi;
    type Response = User;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String {
        "/users".to_owned()
    }

    fn parameters(&self) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert("name".to_owned(), Value::from(self.name.as_str()));
        parameters
    }

    fn response_from_object(&self, object: Value) -> Option<User> {
        Some(User { id: object.get("id")?.as_u64()?, name: object.get("name")?.as_str()?.to_owned() })
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let tcp_listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    let address = tcp_listener.local_addr().expect("listener has a local address");
    let _ = BASE_URL.set(format!("http://{address}/v1"));
    info!(%address, "start listening");

    tokio::spawn(async move {
        let mut next_id = 1_u64;
        loop {
            let (mut tcp_stream, _remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let mut buf = vec![0u8; 8 * 1024];
            let n = tcp_stream.read(&mut buf).await.unwrap_or(0);
            let raw = String::from_utf8_lossy(&buf[..n]);
            let name = raw
                .split("\r\n\r\n")
                .nth(1)
                .and_then(|body| serde_json::from_str::<Value>(body).ok())
                .and_then(|body| body.get("name").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_default();

            let body = json!({ "id": next_id, "name": name }).to_string();
            next_id += 1;
            let response = format!(
                "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            if let Err(e) = tcp_stream.write_all(response.as_bytes()).await {
                warn!(cause = %e, "failed to write response");
            }
        }
    });

    for name in ["zava", "micro"] {
        let (tx, rx) = oneshot::channel::<Result<User, ApiError>>();
        LocalApi::send(CreateUser { name: name.to_owned() }, move |result| {
            let _ = tx.send(result);
        });

        match tokio::time::timeout(Duration::from_secs(5), rx).await {
            Ok(Ok(Ok(user))) => info!(id = user.id, name = %user.name, "created user"),
            Ok(Ok(Err(e))) => error!(cause = %e, domain = %e.domain(), code = e.code(), "request failed"),
            Ok(Err(_)) | Err(_) => error!("no response delivered"),
        }
    }
}
