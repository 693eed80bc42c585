// ScanRuntime - The execution substrate the scan engine runs on
//
// The engine never creates threads or runtimes of its own. It is handed a tokio
// runtime handle and uses it for two things:
// 1. Spawning the session loop as an async task
// 2. Offloading blocking capability calls (capture, decode, login) to the blocking pool

use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

/// Cloneable handle to the runtime a [`ScanEngine`](super::ScanEngine) schedules on.
///
/// Any tokio runtime works: a dedicated multi-thread runtime in the CLI, the test
/// runtime under `#[tokio::test]`, or a runtime shared with a host application.
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let substrate = ScanRuntime::new(runtime.handle().clone());
///
/// substrate.spawn(async move {
///     let frame = substrate.run_blocking(move || source.capture(&target)).await;
/// });
/// ```
#[derive(Clone, Debug)]
pub struct ScanRuntime {
    handle: Handle,
}

impl ScanRuntime {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Runtime of the calling task.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn an async task on the runtime
    pub fn spawn<Fut>(&self, future: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run a blocking call on the runtime's blocking pool and wait for it
    ///
    /// A panic inside `work` surfaces as a [`JoinError`] rather than unwinding
    /// through the caller.
    pub async fn run_blocking<F, R>(&self, work: F) -> Result<R, JoinError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(work).await
    }
}
