use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// One captured failure from a supervised background operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: Uuid,
    pub operation: String,
    pub message: String,
    pub timestamp: u64,
}

impl FailureRecord {
    pub fn new(id: Uuid, operation: impl Into<String>, message: impl Into<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            id,
            operation: operation.into(),
            message: message.into(),
            timestamp,
        }
    }
}

/// Trait for recording failures nobody else is waiting on.
pub trait FailureSink: Send + Sync {
    fn record(&self, entry: FailureRecord);
    fn records(&self) -> Vec<FailureRecord>;
}

/// Simple in-memory collector for failures.
#[derive(Debug, Default)]
pub struct MemoryFailureSink {
    records: Mutex<Vec<FailureRecord>>,
}

impl MemoryFailureSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FailureSink for MemoryFailureSink {
    fn record(&self, entry: FailureRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn records(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
