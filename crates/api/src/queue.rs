//! Serial executors that completion handlers are delivered on.
//!
//! Each [`CallbackQueue`] owns one OS thread that runs submitted closures one at a time, in
//! submission order. Handlers therefore never run on the session's I/O threads, and never
//! run concurrently with other handlers of the same queue.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use micro_api_transport::utils::panic_message;
use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use tracing::{error, trace};

type Job = Box<dyn FnOnce() + Send>;

static MAIN_QUEUE: Lazy<CallbackQueue> = Lazy::new(|| match CallbackQueue::new("micro-api-main") {
    Ok(queue) => queue,
    Err(e) => {
        error!(cause = %e, "failed to spawn the micro-api-main thread");
        panic!("failed to spawn the micro-api-main thread: {e}");
    }
});

#[derive(Clone)]
pub struct CallbackQueue {
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
}

impl CallbackQueue {
    /// Spawns a queue whose thread is named `name`.
    ///
    /// The thread exits once every clone of the queue has been dropped and the pending
    /// closures have run.
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        let name: Arc<str> = Arc::from(name.into());
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread_name = Arc::clone(&name);
        thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    let cause = panic_message(panic.as_ref());
                    error!(queue = %thread_name, %cause, "callback panicked");
                }
            }
            trace!(queue = %thread_name, "callback queue stopped");
        })?;

        Ok(Self { name, sender })
    }

    /// The process-wide default queue, running on the `micro-api-main` thread.
    ///
    /// # Panics
    ///
    /// Panics if the thread cannot be spawned on first use. Backends that must not panic
    /// override [`ApiConfig::callback_queue`](crate::ApiConfig::callback_queue) with a queue
    /// from [`CallbackQueue::new`].
    pub fn main() -> CallbackQueue {
        MAIN_QUEUE.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedules `f` to run on this queue after everything submitted before it.
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(f)).is_err() {
            error!(queue = %self.name, "callback queue thread is gone, dropping callback");
        }
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue").field("name", &self.name).finish_non_exhaustive()
    }
}
