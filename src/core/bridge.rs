use std::future::Future;

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use crate::core::error::{Error, TaskError};

const DEFAULT_WORKERS: usize = 2;

/// Lets synchronous code wait on asynchronous work without deadlocking.
///
/// Work is spawned on a small worker pool the bridge owns, so it never
/// depends on the calling thread to make progress. The caller then blocks on
/// the join handle. Failures come back as-is: the operation's own error
/// value, or its original panic payload resumed on the calling thread.
#[derive(Debug)]
pub struct Bridge {
    // `None` only while dropping.
    runtime: Option<Runtime>,
}

impl Bridge {
    pub fn new() -> Result<Self, Error> {
        Self::with_workers(DEFAULT_WORKERS)
    }

    pub fn with_workers(workers: usize) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name("bridge-worker")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        Ok(Bridge {
            runtime: Some(runtime),
        })
    }

    /// Blocks the current thread until `operation` finishes.
    ///
    /// May be called from plain threads and from inside a runtime. On a
    /// multi-thread runtime worker the wait goes through
    /// [`block_in_place`](tokio::task::block_in_place) so the worker's other
    /// tasks are moved elsewhere while we wait.
    pub fn run_to_completion<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TaskError> + Send + 'static,
    {
        let task = self
            .runtime
            .as_ref()
            .expect("bridge runtime is only taken on drop")
            .spawn(operation);

        let joined = match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| futures::executor::block_on(task))
            }
            _ => futures::executor::block_on(task),
        };

        match joined {
            Ok(outcome) => outcome,
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => Err(E::from(TaskError::from(join_error))),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // A plain drop would block, which panics inside async contexts.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
