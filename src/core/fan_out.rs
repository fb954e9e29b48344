use std::future::Future;

use tokio::task::JoinSet;

use crate::core::error::TaskError;

/// Launches independent operations together and joins them in input order.
///
/// Every branch is spawned onto the runtime before any of them is awaited.
/// The join waits for all branches to settle, even after a failure, and then
/// reports the earliest failure it saw. Dropping the join before it
/// finishes aborts every branch still running.
#[derive(Debug, Clone)]
pub struct FanOutJoin {
    name: String,
}

impl FanOutJoin {
    pub fn new(name: impl Into<String>) -> Self {
        FanOutJoin { name: name.into() }
    }

    pub async fn run_concurrently<I, Fut, T, E>(&self, operations: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TaskError> + Send + 'static,
    {
        let mut set = JoinSet::new();
        for (index, operation) in operations.into_iter().enumerate() {
            set.spawn(async move { (index, operation.await) });
        }
        let branches = set.len();
        log::debug!("fan-out '{}' launched {} branch(es)", self.name, branches);

        let mut slots: Vec<Option<T>> = (0..branches).map(|_| None).collect();
        let mut first_failure: Option<E> = None;
        let mut failed = 0usize;

        while let Some(settled) = set.join_next().await {
            let err = match settled {
                Ok((index, Ok(value))) => {
                    slots[index] = Some(value);
                    continue;
                }
                Ok((index, Err(err))) => {
                    log::warn!("fan-out '{}' branch {} failed", self.name, index);
                    err
                }
                Err(join_error) => {
                    log::warn!("fan-out '{}' lost a branch: {}", self.name, join_error);
                    E::from(TaskError::from(join_error))
                }
            };
            failed += 1;
            first_failure.get_or_insert(err);
        }

        if let Some(err) = first_failure {
            log::error!(
                "fan-out '{}' failed: {}/{} branch(es) failed",
                self.name,
                failed,
                branches
            );
            return Err(err);
        }

        // Every slot is filled once no branch failed.
        Ok(slots.into_iter().flatten().collect())
    }

    /// Runs branches that each yield a sequence and concatenates them,
    /// branch order first, then order within each branch.
    pub async fn run_flattened<I, Fut, T, E>(&self, operations: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TaskError> + Send + 'static,
    {
        let per_branch = self.run_concurrently(operations).await?;
        Ok(per_branch.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn delayed(ms: u64, value: &'static str) -> BoxFuture<'static, Result<&'static str, Error>> {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        }
        .boxed()
    }

    fn delayed_value(ms: u64, value: u8) -> BoxFuture<'static, Result<u8, Error>> {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let join = FanOutJoin::new("ordered");
        let results = join
            .run_concurrently(vec![delayed(300, "A"), delayed(100, "B"), delayed(200, "C")])
            .await
            .unwrap();

        assert_eq!(results, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_branches_run_concurrently() {
        let join = FanOutJoin::new("parallel");
        let started = Instant::now();
        join.run_concurrently(vec![delayed(200, "a"), delayed(200, "b"), delayed(200, "c")])
            .await
            .unwrap();

        // Sequential awaiting would take at least 600ms.
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_failure_reported_after_all_branches_settle() {
        let join = FanOutJoin::new("settle");
        let finished: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        let branch = |ms: u64, fail: bool| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                finished.lock().unwrap().push(Instant::now());
                if fail {
                    Err(Error::Background(format!("branch {ms} failed")))
                } else {
                    Ok(ms)
                }
            }
            .boxed()
        };

        let outcome = join
            .run_concurrently(vec![branch(150, false), branch(10, true), branch(100, false)])
            .await;
        let reported_at = Instant::now();

        assert!(matches!(outcome, Err(Error::Background(ref msg)) if msg == "branch 10 failed"));
        let finished = finished.lock().unwrap();
        assert_eq!(finished.len(), 3);
        let last = finished.iter().max().copied().unwrap();
        assert!(reported_at >= last);
    }

    #[tokio::test]
    async fn test_first_observed_failure_wins() {
        let join = FanOutJoin::new("first-failure");
        let slow_fail = async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            Err::<u8, _>(Error::Background("slow".into()))
        }
        .boxed();
        let fast_fail = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u8, _>(Error::Background("fast".into()))
        }
        .boxed();

        let err = join.run_concurrently(vec![slow_fail, fast_fail]).await.unwrap_err();
        assert!(matches!(err, Error::Background(ref msg) if msg == "fast"));
    }

    #[tokio::test]
    async fn test_panicking_branch_becomes_task_error() {
        let join = FanOutJoin::new("panic");
        let ok = async { Ok::<u8, Error>(1) }.boxed();
        let boom = async {
            if true {
                panic!("branch exploded");
            }
            Ok::<u8, Error>(2)
        }
        .boxed();

        let err = join.run_concurrently(vec![ok, boom]).await.unwrap_err();
        assert!(matches!(err, Error::Task(TaskError::Panicked(ref msg)) if msg == "branch exploded"));
    }

    #[tokio::test]
    async fn test_flattened_keeps_branch_then_item_order() {
        let join = FanOutJoin::new("flatten");
        let branch = |ms: u64, items: Vec<u32>| {
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, Error>(items)
            }
            .boxed()
        };

        let flat = join
            .run_flattened(vec![branch(60, vec![1, 2]), branch(5, vec![]), branch(20, vec![3, 4, 5])])
            .await
            .unwrap();
        assert_eq!(flat, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_dropping_the_join_aborts_running_branches() {
        let join = FanOutJoin::new("dropped");
        let finished = Arc::new(AtomicBool::new(false));

        let slow = {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.store(true, Ordering::SeqCst);
                Ok::<_, Error>(1)
            }
            .boxed()
        };

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            join.run_concurrently(vec![slow, delayed_value(5, 2)]),
        )
        .await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let join = FanOutJoin::new("empty");
        let results: Vec<u8> = join
            .run_concurrently(Vec::<BoxFuture<'static, Result<u8, Error>>>::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
