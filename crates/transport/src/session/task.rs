use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::utils::lock;

/// Process-unique identity of a data task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a [`DataTask`].
///
/// `Suspended -> Running -> Completed`, with `Canceling` in between when the task is
/// cancelled before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Suspended,
    Running,
    Canceling,
    Completed,
}

pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to one request running on a [`Session`](crate::session::Session).
///
/// Cloning the handle does not clone the task. The task does nothing until
/// [`resume`](DataTask::resume) is called.
#[derive(Clone)]
pub struct DataTask {
    shared: Arc<TaskShared>,
}

struct TaskShared {
    id: TaskId,
    control: TaskControl,
    launch: Mutex<Option<(Handle, TaskFuture)>>,
}

/// The part of a task its running future sees.
#[derive(Debug, Clone)]
pub(crate) struct TaskControl {
    state: Arc<Mutex<TaskState>>,
    cancel_token: CancellationToken,
}

impl TaskControl {
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub(crate) fn complete(&self) {
        *lock(&self.state) = TaskState::Completed;
    }
}

impl DataTask {
    pub(crate) fn new<F>(id: TaskId, handle: Handle, make_future: F) -> Self
    where
        F: FnOnce(TaskControl) -> TaskFuture,
    {
        let control = TaskControl { state: Arc::new(Mutex::new(TaskState::Suspended)), cancel_token: CancellationToken::new() };
        let future = make_future(control.clone());
        let shared = TaskShared { id, control, launch: Mutex::new(Some((handle, future))) };
        Self { shared: Arc::new(shared) }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn state(&self) -> TaskState {
        *lock(&self.shared.control.state)
    }

    /// Starts the task. Calling it again, or on a finished task, does nothing.
    pub fn resume(&self) {
        let Some((handle, future)) = lock(&self.shared.launch).take() else {
            return;
        };

        {
            let mut state = lock(&self.shared.control.state);
            if *state == TaskState::Suspended {
                *state = TaskState::Running;
            }
        }
        debug!(task = %self.shared.id, "resume task");
        handle.spawn(future);
    }

    /// Cancels the task if it has not completed yet.
    ///
    /// A cancelled task still completes exactly once, with
    /// [`TransportError::Cancelled`](crate::protocol::TransportError::Cancelled). A suspended
    /// task is started so that its completion is reported.
    pub fn cancel(&self) {
        {
            let mut state = lock(&self.shared.control.state);
            if matches!(*state, TaskState::Completed | TaskState::Canceling) {
                return;
            }
            *state = TaskState::Canceling;
        }
        debug!(task = %self.shared.id, "cancel task");
        self.shared.control.cancel_token.cancel();
        self.resume();
    }
}

impl fmt::Debug for DataTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTask").field("id", &self.shared.id).field("state", &self.state()).finish()
    }
}
