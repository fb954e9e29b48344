use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PlaygroundSettings;
use crate::core::bridge::Bridge;
use crate::core::cache::MemoizingCache;
use crate::core::cancellation::CancellableLoop;
use crate::core::error::{Error, Result};
use crate::core::fan_out::FanOutJoin;
use crate::core::supervisor::Supervisor;
use crate::core::telemetry::FailureRecord;
use crate::files;
use crate::store::{Employee, EmployeeStore, NewEmployee};

/// Departments queried together by the fan-out step.
pub const DEPARTMENTS: [&str; 3] = ["IT", "Financial", "BI"];

/// The key the cache is seeded with.
pub const SEEDED_KEY: &str = "x";
pub const SEEDED_VALUE: i64 = 42;

/// How the cancellable job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopOutcome {
    Completed(usize),
    Cancelled(usize),
}

/// What a single pass of [`Orchestrator::run`] produced.
///
/// `background_failures` covers every failure the supervisor has recorded so
/// far, including those from earlier runs of the same orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub rows_inserted: u64,
    pub employees_listed: usize,
    pub config_text_len: usize,
    pub department_employees: Vec<Employee>,
    pub first_employee_name: Option<String>,
    pub cached_values: BTreeMap<String, i64>,
    pub loop_outcome: LoopOutcome,
    pub background_failures: Vec<FailureRecord>,
}

/// Drives the fixed sequence of steps against an [`EmployeeStore`].
///
/// The cache lives as long as the orchestrator, so repeated runs reuse what
/// earlier runs computed.
#[derive(Debug)]
pub struct Orchestrator<S: EmployeeStore> {
    store: Arc<S>,
    config_path: PathBuf,
    settings: PlaygroundSettings,
    cache: MemoizingCache,
    supervisor: Supervisor,
    bridge: Bridge,
}

impl<S: EmployeeStore> Orchestrator<S> {
    pub fn new(store: Arc<S>, config_path: impl Into<PathBuf>, settings: PlaygroundSettings) -> Result<Self> {
        let bridge = Bridge::with_workers(settings.bridge_workers)?;
        let cache = MemoizingCache::new();
        cache.seed(SEEDED_KEY, SEEDED_VALUE);

        Ok(Orchestrator {
            store,
            config_path: config_path.into(),
            settings,
            cache,
            supervisor: Supervisor::default(),
            bridge,
        })
    }

    pub fn with_supervisor(mut self, supervisor: Supervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn cache(&self) -> &MemoizingCache {
        &self.cache
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Runs every step in order.
    ///
    /// Store failures stop the run. A cancelled loop does not. Detached work
    /// is drained before returning, on success and on failure, so its
    /// failures are always recorded.
    pub async fn run(&self) -> Result<RunReport> {
        let outcome = self.run_steps().await;

        self.supervisor.drain().await;
        let background_failures = self.supervisor.failures();
        log::info!(
            "run finished with {} recorded background failure(s)",
            background_failures.len()
        );

        outcome.map(|report| RunReport {
            background_failures,
            ..report
        })
    }

    async fn run_steps(&self) -> Result<RunReport> {
        self.greet();
        let rows_inserted = self.add_employee().await?;
        self.launch_detached_failure();
        let employees_listed = self.list_employees().await?.len();
        let config_text_len = self.read_config_text().await?.len();
        let department_employees = self.employees_from_departments(&DEPARTMENTS).await?;
        let first_employee_name = self.first_employee_name()?;
        self.run_important_job().await?;
        self.start_background_work();
        let cached_values = self.cached_values().await?;
        let loop_outcome = self.cancellable_job().await;

        Ok(RunReport {
            rows_inserted,
            employees_listed,
            config_text_len,
            department_employees,
            first_employee_name,
            cached_values,
            loop_outcome,
            background_failures: Vec::new(),
        })
    }

    fn greet(&self) {
        log::info!("Hello World!");
    }

    async fn add_employee(&self) -> Result<u64> {
        match self.store.insert(NewEmployee::new("John Doe", "IT")).await {
            Ok(rows) => {
                log::info!("inserted {} employee row(s)", rows);
                Ok(rows)
            }
            Err(err) => {
                log::error!("failed to insert employee: {}", err);
                Err(err.into())
            }
        }
    }

    /// Starts work that fails with nobody awaiting it. The supervisor records it.
    fn launch_detached_failure(&self) -> Uuid {
        let delay = self.settings.background_delay();
        self.supervisor.spawn_detached("detached-failure", async move {
            tokio::time::sleep(delay).await;
            Err::<(), _>(Error::Background("Hmmm, something went wrong!".into()))
        })
    }

    async fn list_employees(&self) -> Result<Vec<Employee>> {
        let employees = self.store.list_all().await?;
        log::info!("store holds {} employee(s)", employees.len());
        Ok(employees)
    }

    async fn read_config_text(&self) -> Result<String> {
        let text = files::read_text(&self.config_path).await?;
        log::info!("read {} byte(s) of configuration", text.len());
        Ok(text)
    }

    async fn employees_from_departments(&self, departments: &[&str]) -> Result<Vec<Employee>> {
        let queries = departments.iter().map(|department| {
            let store = Arc::clone(&self.store);
            let department = department.to_string();
            async move {
                store
                    .list_by_department(&department)
                    .await
                    .map_err(Error::from)
            }
        });

        let employees = FanOutJoin::new("departments").run_flattened(queries).await?;
        log::info!(
            "{} employee(s) across {} department(s)",
            employees.len(),
            departments.len()
        );
        Ok(employees)
    }

    /// Blocks on the store through the bridge. An empty store is not an error.
    fn first_employee_name(&self) -> Result<Option<String>> {
        let store = Arc::clone(&self.store);
        let first = self.bridge.run_to_completion(async move {
            store.first_or_default().await.map_err(Error::from)
        })?;

        match first {
            Some(employee) => {
                log::info!("first employee is {}", employee.name);
                Ok(Some(employee.name))
            }
            None => {
                log::warn!("store is empty, no first employee");
                Ok(None)
            }
        }
    }

    async fn run_important_job(&self) -> Result<()> {
        let delay = self.settings.important_job_delay();
        let handle = self.supervisor.supervise("important-job", async move {
            tokio::time::sleep(delay).await;
            Ok::<_, Error>(())
        });
        handle.outcome().await?;
        log::info!("important job finished");
        Ok(())
    }

    fn start_background_work(&self) -> Uuid {
        let delay = self.settings.background_delay();
        self.supervisor.spawn_detached("background-work", async move {
            tokio::time::sleep(delay).await;
            log::info!("Background work completed!");
            Err::<(), _>(Error::Background("Background work failed!".into()))
        })
    }

    async fn cached_values(&self) -> Result<BTreeMap<String, i64>> {
        let mut values = BTreeMap::new();
        for key in [SEEDED_KEY, "y"] {
            let delay = self.settings.fetch_delay();
            let value = self
                .cache
                .get_or_compute(key, move || fetch_value(delay))
                .await?;
            log::info!("cached value for '{}' is {}", key, value);
            values.insert(key.to_string(), value);
        }
        Ok(values)
    }

    async fn cancellable_job(&self) -> LoopOutcome {
        let job = CancellableLoop::new(self.settings.loop_steps, self.settings.loop_step_delay());
        let token = CancellationToken::new();
        let cancel_after = self.settings.cancel_after();

        let canceller = async {
            tokio::select! {
                _ = tokio::time::sleep(cancel_after) => token.cancel(),
                _ = token.cancelled() => {}
            }
        };
        let run = async {
            let outcome = job
                .run_with_progress(&token, |step| log::debug!("long job step {}", step))
                .await;
            // Stop the canceller once the job is over either way.
            token.cancel();
            outcome
        };
        let (outcome, ()) = tokio::join!(run, canceller);

        match outcome {
            Ok(steps) => {
                log::info!("long job completed {} step(s)", steps);
                LoopOutcome::Completed(steps)
            }
            Err(cancelled) => {
                log::info!("long job stopped: {}", cancelled);
                LoopOutcome::Cancelled(cancelled.completed_steps)
            }
        }
    }
}

/// Stands in for a slow lookup that produces a random non-negative value.
async fn fetch_value(delay: Duration) -> Result<i64> {
    tokio::time::sleep(delay).await;
    let (high, _) = Uuid::new_v4().as_u64_pair();
    Ok((high >> 1) as i64)
}
