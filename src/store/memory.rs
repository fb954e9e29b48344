use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::store::{Employee, EmployeeStore, NewEmployee, StoreError};

/// An [`EmployeeStore`] that keeps everything in process memory.
///
/// Ids are assigned from 1 upwards when staged records are saved. An optional
/// per-call latency makes concurrent reads actually overlap.
#[derive(Debug)]
pub struct MemoryStore {
    database: String,
    latency: Duration,
    rows: RwLock<Vec<Employee>>,
    staged: Mutex<Vec<NewEmployee>>,
}

impl MemoryStore {
    /// Creates an empty store named after `database`.
    pub fn new(database: impl Into<String>) -> Self {
        MemoryStore {
            database: database.into(),
            latency: Duration::ZERO,
            rows: RwLock::new(Vec::new()),
            staged: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    async fn simulate_io(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn validate(employee: &NewEmployee) -> Result<(), StoreError> {
    if employee.name.trim().is_empty() {
        return Err(StoreError::Constraint("employee name must not be blank".into()));
    }
    if employee.department.trim().is_empty() {
        return Err(StoreError::Constraint(format!(
            "employee '{}' has no department",
            employee.name
        )));
    }
    Ok(())
}

fn append_rows(rows: &mut Vec<Employee>, batch: Vec<NewEmployee>) -> u64 {
    let mut next_id = rows.last().map_or(1, |last| last.id + 1);
    let affected = batch.len() as u64;
    for employee in batch {
        rows.push(Employee {
            id: next_id,
            name: employee.name,
            department: employee.department,
        });
        next_id += 1;
    }
    affected
}

#[async_trait]
impl EmployeeStore for MemoryStore {
    /// Rejects invalid records here, so a bad record never reaches the queue.
    async fn stage(&self, employee: NewEmployee) -> Result<(), StoreError> {
        validate(&employee)?;
        self.staged.lock().await.push(employee);
        Ok(())
    }

    async fn save_changes(&self) -> Result<u64, StoreError> {
        self.simulate_io().await;

        // The batch leaves the queue whether or not it is written.
        let staged = std::mem::take(&mut *self.staged.lock().await);
        if let Err(err) = staged.iter().try_for_each(validate) {
            log::warn!("discarded {} staged row(s) for '{}': {}", staged.len(), self.database, err);
            return Err(err);
        }

        let mut rows = self.rows.write().await;
        let affected = append_rows(&mut rows, staged);
        log::debug!("saved {} row(s) to '{}'", affected, self.database);
        Ok(affected)
    }

    /// Writes one record under the rows lock, independent of anything staged.
    async fn insert(&self, employee: NewEmployee) -> Result<u64, StoreError> {
        validate(&employee)?;
        self.simulate_io().await;

        let mut rows = self.rows.write().await;
        let affected = append_rows(&mut rows, vec![employee]);
        log::debug!("inserted {} row(s) into '{}'", affected, self.database);
        Ok(affected)
    }

    async fn list_all(&self) -> Result<Vec<Employee>, StoreError> {
        self.simulate_io().await;
        Ok(self.rows.read().await.clone())
    }

    async fn list_where(
        &self,
        filter: &(dyn for<'e> Fn(&'e Employee) -> bool + Send + Sync),
    ) -> Result<Vec<Employee>, StoreError> {
        self.simulate_io().await;
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|employee| filter(*employee)).cloned().collect())
    }

    async fn first_or_default(&self) -> Result<Option<Employee>, StoreError> {
        self.simulate_io().await;
        Ok(self.rows.read().await.first().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new("AsyncPlaygroundDb");
        assert_eq!(store.insert(NewEmployee::new("John Doe", "IT")).await, Ok(1));
        assert_eq!(store.insert(NewEmployee::new("Jane Roe", "BI")).await, Ok(1));

        let all = store.list_all().await.unwrap();
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(all[1].department, "BI");
    }

    #[tokio::test]
    async fn test_save_writes_every_staged_record() {
        let store = MemoryStore::new("db");
        store.stage(NewEmployee::new("a", "IT")).await.unwrap();
        store.stage(NewEmployee::new("b", "IT")).await.unwrap();

        assert_eq!(store.save_changes().await, Ok(2));
        assert_eq!(store.save_changes().await, Ok(0));
    }

    #[tokio::test]
    async fn test_invalid_record_is_rejected_at_stage() {
        let store = MemoryStore::new("db");
        store.stage(NewEmployee::new("ok", "IT")).await.unwrap();

        let err = store.stage(NewEmployee::new("  ", "IT")).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(matches!(
            store.stage(NewEmployee::new("no dept", "")).await,
            Err(StoreError::Constraint(_))
        ));

        assert_eq!(store.save_changes().await, Ok(1));
        let names: Vec<_> = store.list_all().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_rejected_insert_leaves_store_usable() {
        let store = MemoryStore::new("db");

        let rejected = store.insert(NewEmployee::new("  ", "IT")).await;
        assert!(matches!(rejected, Err(StoreError::Constraint(_))));

        assert_eq!(store.insert(NewEmployee::new("John Doe", "IT")).await, Ok(1));
        assert_eq!(store.save_changes().await, Ok(0));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_does_not_commit_staged_records() {
        let store = MemoryStore::new("db");
        store.stage(NewEmployee::new("staged", "BI")).await.unwrap();

        assert_eq!(store.insert(NewEmployee::new("direct", "IT")).await, Ok(1));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
        assert_eq!(store.save_changes().await, Ok(1));

        let ids: Vec<_> = store.list_all().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_each_report_their_own_row() {
        let store = std::sync::Arc::new(MemoryStore::new("db").with_latency(Duration::from_millis(2)));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert(NewEmployee::new(format!("employee {i}"), "IT")).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(1));
        }

        let mut ids: Vec<_> = store.list_all().await.unwrap().into_iter().map(|e| e.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_filters_by_department() {
        let store = MemoryStore::new("db");
        for (name, dept) in [("a", "IT"), ("b", "Financial"), ("c", "IT")] {
            store.insert(NewEmployee::new(name, dept)).await.unwrap();
        }

        let it = store.list_by_department("IT").await.unwrap();
        assert_eq!(it.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(store.list_by_department("BI").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_where_accepts_borrowing_filter() {
        let store = MemoryStore::new("db");
        for (name, dept) in [("Ann", "IT"), ("Bob", "BI"), ("Amy", "BI")] {
            store.insert(NewEmployee::new(name, dept)).await.unwrap();
        }

        let prefix = String::from("A");
        let matches = store
            .list_where(&|employee: &Employee| employee.name.starts_with(prefix.as_str()))
            .await
            .unwrap();
        assert_eq!(matches.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_first_or_default_on_empty_store() {
        let store = MemoryStore::new("db").with_latency(Duration::from_millis(1));
        assert_eq!(store.first_or_default().await, Ok(None));
        assert_eq!(store.database(), "db");
    }
}
