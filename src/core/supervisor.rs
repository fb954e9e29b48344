use std::fmt::{self, Display};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::error::TaskError;
use crate::core::telemetry::{FailureRecord, FailureSink, MemoryFailureSink};

/// Owns background work so its failures are always seen.
///
/// Every operation runs behind a boundary that catches both returned errors
/// and panics, logs them, and writes a [`FailureRecord`] to the sink. A caller
/// that wants the result keeps the [`SupervisedHandle`]; fire-and-forget work
/// goes through [`spawn_detached`](Self::spawn_detached), whose handle the
/// supervisor keeps until [`drain`](Self::drain).
pub struct Supervisor {
    sink: Arc<dyn FailureSink>,
    detached: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("detached", &self.detached_count())
            .field("recorded_failures", &self.sink.records().len())
            .finish()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(Arc::new(MemoryFailureSink::new()))
    }
}

impl Supervisor {
    pub fn new(sink: Arc<dyn FailureSink>) -> Self {
        Self {
            sink,
            detached: Mutex::new(Vec::new()),
        }
    }

    /// Starts `operation` on the runtime and returns a handle to its outcome.
    ///
    /// The caller is not blocked. Dropping the handle does not stop the work
    /// and a failure is still recorded.
    pub fn supervise<F, T, E>(&self, name: &str, operation: F) -> SupervisedHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TaskError> + Display + Send + 'static,
    {
        let id = Uuid::new_v4();
        let task = tokio::spawn(guarded(id, name.to_string(), Arc::clone(&self.sink), operation));
        log::debug!("supervising '{}' ({})", name, id);

        SupervisedHandle {
            id,
            name: name.to_string(),
            task,
        }
    }

    /// Starts `operation` without handing anything back to the caller.
    ///
    /// The supervisor retains the task; use [`drain`](Self::drain) to wait for
    /// every detached task before shutting down.
    pub fn spawn_detached<F, T, E>(&self, name: &str, operation: F) -> Uuid
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TaskError> + Display + Send + 'static,
    {
        let id = Uuid::new_v4();
        let guarded = guarded(id, name.to_string(), Arc::clone(&self.sink), operation);
        let task = tokio::spawn(async move {
            // Failures were already logged and recorded inside the boundary.
            let _ = guarded.await;
        });
        log::debug!("detached '{}' ({})", name, id);

        self.lock_detached().push(task);
        id
    }

    /// Waits for every detached task started so far.
    pub async fn drain(&self) {
        let tasks = std::mem::take(&mut *self.lock_detached());
        if tasks.is_empty() {
            return;
        }

        log::debug!("draining {} detached task(s)", tasks.len());
        for task in tasks {
            if let Err(err) = task.await {
                // Only reachable if the failure sink itself panicked.
                log::error!("detached task ended abnormally: {}", err);
            }
        }
    }

    pub fn detached_count(&self) -> usize {
        self.lock_detached().len()
    }

    /// Everything the sink has recorded so far.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.sink.records()
    }

    fn lock_detached(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.detached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A caller's view of one supervised operation.
#[derive(Debug)]
pub struct SupervisedHandle<T, E> {
    id: Uuid,
    name: String,
    task: JoinHandle<Result<T, E>>,
}

impl<T, E> SupervisedHandle<T, E>
where
    E: From<TaskError>,
{
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the operation and returns its own result or error.
    pub async fn outcome(self) -> Result<T, E> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(E::from(TaskError::from(join_error))),
        }
    }
}

/// The supervision boundary: nothing inside `operation` escapes unobserved.
async fn guarded<F, T, E>(
    id: Uuid,
    name: String,
    sink: Arc<dyn FailureSink>,
    operation: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    E: From<TaskError> + Display,
{
    let outcome = match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(E::from(TaskError::from_panic(&*payload))),
    };

    if let Err(err) = &outcome {
        log::error!("background operation '{}' ({}) failed: {}", name, id, err);
        sink.record(FailureRecord::new(id, name, err.to_string()));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn test_outcome_returns_value() {
        let supervisor = Supervisor::default();
        let handle = supervisor.supervise("ok", async { Ok::<_, Error>(5) });

        assert_eq!(handle.name(), "ok");
        assert_eq!(handle.outcome().await.unwrap(), 5);
        assert!(supervisor.failures().is_empty());
    }

    #[tokio::test]
    async fn test_outcome_reraises_the_same_error() {
        let supervisor = Supervisor::default();
        let handle = supervisor.supervise("bad", async {
            Err::<(), _>(Error::Background("disk full".into()))
        });
        let id = handle.id();

        let err = handle.outcome().await.unwrap_err();
        assert!(matches!(err, Error::Background(ref msg) if msg == "disk full"));

        let failures = supervisor.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, id);
        assert_eq!(failures[0].operation, "bad");
    }

    #[tokio::test]
    async fn test_unobserved_failure_is_still_recorded() {
        let supervisor = Supervisor::default();
        supervisor.spawn_detached("fire-and-forget", async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<(), _>(Error::Background("Background work failed!".into()))
        });
        assert_eq!(supervisor.detached_count(), 1);

        supervisor.drain().await;

        assert_eq!(supervisor.detached_count(), 0);
        let failures = supervisor.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("Background work failed!"));
    }

    #[tokio::test]
    async fn test_dropped_handle_failure_is_recorded() {
        let supervisor = Supervisor::default();
        let handle = supervisor.supervise("dropped", async {
            Err::<(), _>(Error::Background("nobody listened".into()))
        });
        drop(handle);

        for _ in 0..50 {
            if !supervisor.failures().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(supervisor.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_captured_not_propagated() {
        let supervisor = Supervisor::default();
        let handle = supervisor.supervise("panicky", async {
            if true {
                panic!("Hmmm, something went wrong!");
            }
            Ok::<(), Error>(())
        });

        let err = handle.outcome().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Task(TaskError::Panicked(ref msg)) if msg == "Hmmm, something went wrong!"
        ));
        assert_eq!(supervisor.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_supervise_does_not_block_caller() {
        let supervisor = Supervisor::default();
        let handle = supervisor.supervise("slow", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, Error>(())
        });

        assert!(!handle.is_finished());
        handle.outcome().await.unwrap();
    }
}
