//! The process-wide I/O runtime sessions run their tasks on by default.

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{error, info};

static IO_RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    info!("starting micro-api-io runtime");
    match Builder::new_multi_thread().thread_name("micro-api-io").enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(cause = %e, "failed to start the micro-api-io runtime");
            panic!("failed to start the micro-api-io runtime: {e}");
        }
    }
});

/// Handle to the shared `micro-api-io` runtime, started on first use.
///
/// # Panics
///
/// Panics if the runtime's worker threads cannot be spawned on first use. Sessions that
/// must not panic pass their own runtime handle to
/// [`Session::new`](crate::session::Session::new) instead.
pub fn io_handle() -> Handle {
    IO_RUNTIME.handle().clone()
}
