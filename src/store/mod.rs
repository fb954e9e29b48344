//! The employee-record store the orchestrator talks to.
//!
//! - [`EmployeeStore`] is the asynchronous contract (unit-of-work style:
//!   stage records, then save them)
//! - [`MemoryStore`] is an in-memory implementation keyed by a database name

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;

/// A persisted employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub department: String,
}

/// An employee that has not been saved yet, so it has no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub department: String,
}

impl NewEmployee {
    pub fn new(name: impl Into<String>, department: impl Into<String>) -> Self {
        NewEmployee {
            name: name.into(),
            department: department.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violated: {0}")]
    Constraint(String),
}

#[async_trait]
pub trait EmployeeStore: Send + Sync + 'static {
    /// Queues a record to be written by the next [`save_changes`](Self::save_changes).
    async fn stage(&self, employee: NewEmployee) -> Result<(), StoreError>;

    /// Writes every staged record and returns how many rows were affected.
    async fn save_changes(&self) -> Result<u64, StoreError>;

    /// All saved records, in id order.
    async fn list_all(&self) -> Result<Vec<Employee>, StoreError>;

    /// Saved records matching `filter`, in id order.
    async fn list_where(
        &self,
        filter: &(dyn for<'e> Fn(&'e Employee) -> bool + Send + Sync),
    ) -> Result<Vec<Employee>, StoreError>;

    /// The first saved record, or `None` when the store is empty.
    async fn first_or_default(&self) -> Result<Option<Employee>, StoreError>;

    /// Stages and saves a single record.
    async fn insert(&self, employee: NewEmployee) -> Result<u64, StoreError> {
        self.stage(employee).await?;
        self.save_changes().await
    }

    async fn list_by_department(&self, department: &str) -> Result<Vec<Employee>, StoreError> {
        self.list_where(&|employee: &Employee| employee.department == department)
            .await
    }
}
