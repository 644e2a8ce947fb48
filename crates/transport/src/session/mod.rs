//! Sessions run data tasks and report their events to a delegate.
//!
//! A [`Session`] owns a [`SessionConfig`], a [`SessionDelegate`] and a tokio runtime handle.
//! [`Session::data_task`] wraps one request in a suspended [`DataTask`]. Once resumed, the
//! task performs the round trip through the configured [`Exchange`] and reports:
//!
//! - every payload chunk, in arrival order, through [`SessionDelegate::did_receive_data`]
//! - exactly one outcome through [`SessionDelegate::did_complete`], after the last chunk
//!
//! The outcome is a [`TransportError`] for cancellation, timeouts and connection failures.
//! HTTP status codes are not errors at this layer. A task whose exchange panics, or whose
//! future is dropped unfinished, completes with [`TransportError::Aborted`].

mod config;
mod exchange;
#[cfg(feature = "reqwest")]
mod reqwest_exchange;
mod runtime;
mod task;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use exchange::{DataSink, Exchange, Http1Exchange};
#[cfg(feature = "reqwest")]
pub use reqwest_exchange::ReqwestExchange;
pub use runtime::io_handle;
pub use task::{DataTask, TaskId, TaskState};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::Request;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::protocol::{ResponseHead, TransportError};
use crate::utils::panic_message;
use task::TaskControl;

/// Receives the events of every task on a session.
///
/// Methods are called from the session's runtime threads and must not block.
#[cfg_attr(test, mockall::automock)]
pub trait SessionDelegate: Send + Sync {
    fn did_receive_data(&self, task_id: TaskId, data: Bytes);

    fn did_complete(&self, task_id: TaskId, result: Result<ResponseHead, TransportError>);
}

pub struct Session {
    config: SessionConfig,
    delegate: Arc<dyn SessionDelegate>,
    handle: Handle,
}

impl Session {
    /// Creates a session whose tasks run on `handle`, or on the shared `micro-api-io`
    /// runtime when `handle` is `None`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is `None` and the shared runtime cannot be started, see [`io_handle`].
    pub fn new(config: SessionConfig, delegate: Arc<dyn SessionDelegate>, handle: Option<Handle>) -> Self {
        info!(?config, "create session");
        Self { config, delegate, handle: handle.unwrap_or_else(io_handle) }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn delegate(&self) -> &Arc<dyn SessionDelegate> {
        &self.delegate
    }

    /// Creates a suspended task for `request`.
    pub fn data_task(&self, mut request: Request<Bytes>) -> DataTask {
        let id = TaskId::next();

        for (name, value) in self.config.additional_headers() {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }

        let exchange = Arc::clone(self.config.exchange());
        let delegate = Arc::clone(&self.delegate);
        let timeout = self.config.timeout();

        DataTask::new(id, self.handle.clone(), move |control| {
            let mut sink = DataSink::new(id, Arc::clone(&delegate));
            let completion = Completion::new(id, control.clone(), delegate);
            Box::pin(async move {
                debug!(task = %id, method = %request.method(), uri = %request.uri(), "start task");

                let run = async {
                    tokio::select! {
                        biased;
                        () = control.cancel_token().cancelled() => Err(TransportError::Cancelled),
                        result = tokio::time::timeout(timeout, exchange.exchange(request, &mut sink)) => {
                            result.unwrap_or(Err(TransportError::TimedOut { timeout }))
                        }
                    }
                };
                let result = match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(TransportError::aborted(format!("exchange panicked: {}", panic_message(panic.as_ref())))),
                };

                match &result {
                    Ok(head) => debug!(task = %id, status = %head.status(), received = sink.received(), "task completed"),
                    Err(e) => error!(task = %id, cause = %e, "task failed"),
                }

                completion.report(result);
            })
        })
    }
}

/// Reports the outcome of one task to the delegate, exactly once.
///
/// If the task future is dropped before it reported anything (its runtime shut down, or it
/// was never resumed), the drop reports [`TransportError::Aborted`] instead.
struct Completion {
    id: TaskId,
    control: TaskControl,
    delegate: Option<Arc<dyn SessionDelegate>>,
}

impl Completion {
    fn new(id: TaskId, control: TaskControl, delegate: Arc<dyn SessionDelegate>) -> Self {
        Self { id, control, delegate: Some(delegate) }
    }

    fn report(mut self, result: Result<ResponseHead, TransportError>) {
        if let Some(delegate) = self.delegate.take() {
            self.control.complete();
            delegate.did_complete(self.id, result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(delegate) = self.delegate.take() {
            warn!(task = %self.id, "task dropped before it completed");
            self.control.complete();
            delegate.did_complete(self.id, Err(TransportError::aborted("task dropped before it completed")));
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("config", &self.config).finish_non_exhaustive()
    }
}
