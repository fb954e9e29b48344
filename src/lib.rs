//! # Async Playground
//!
//! A small asynchronous task orchestration core. It runs a fixed sequence of
//! independent steps against an employee store, each one exercising a
//! different concurrency concern.
//!
//! ## Features
//!
//! - **Fan-out / join**: launch independent queries together, join them in input order
//! - **Supervised background work**: detached failures are logged and recorded, never lost
//! - **Memoization**: a concurrent cache whose hits never allocate a future
//! - **Sync bridge**: block on async work from sync code without deadlocking
//! - **Cooperative cancellation**: a long job that stops at the next step boundary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_playground::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> async_playground::Result<()> {
//! let store = Arc::new(MemoryStore::new("AsyncPlaygroundDb"));
//! let orchestrator = Orchestrator::new(store, "config.json", PlaygroundSettings::default())?;
//! let report = orchestrator.run().await?;
//! println!("{} background failure(s) recorded", report.background_failures.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`store`]: The employee store contract and its in-memory implementation
//! - [`config`]: JSON configuration loaded at startup
//! - [`files`]: Scoped text file reading
//! - [`orchestrator`]: The fixed sequence of steps
//! - [`prelude`]: Commonly used types (import with `use async_playground::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

pub mod config;
pub mod files;
pub mod orchestrator;
pub mod store;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Errors
pub use crate::core::error::{Cancelled, Error, Result, TaskError};

// Building blocks
pub use crate::core::bridge::Bridge;
pub use crate::core::cache::{Lookup, MemoizingCache};
pub use crate::core::cancellation::{CancellableLoop, LoopState};
pub use crate::core::fan_out::FanOutJoin;
pub use crate::core::supervisor::{SupervisedHandle, Supervisor};
pub use crate::core::telemetry::{FailureRecord, FailureSink, MemoryFailureSink};

// Collaborators and the orchestrator
pub use config::{AppConfig, PlaygroundSettings};
pub use files::ScopedReader;
pub use orchestrator::{LoopOutcome, Orchestrator, RunReport};
pub use store::{Employee, EmployeeStore, MemoryStore, NewEmployee, StoreError};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// Everything needed to wire up and run the orchestrator.
///
/// # Example
/// ```rust
/// use async_playground::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        AppConfig,
        // Building blocks
        Bridge,
        CancellableLoop,
        Cancelled,
        // Store
        Employee,
        EmployeeStore,
        Error,
        FailureRecord,
        FanOutJoin,
        MemoizingCache,
        MemoryStore,
        NewEmployee,
        // Orchestration
        Orchestrator,
        PlaygroundSettings,
        RunReport,
        StoreError,
        SupervisedHandle,
        Supervisor,
        TaskError,
    };
    pub use tokio_util::sync::CancellationToken;
}

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
