//! The concurrency building blocks the orchestrator is composed from.
//!
//! - [`cache`]: compute-on-miss memoization over a concurrent map
//! - [`cancellation`]: a stepwise job that honours a cancellation token
//! - [`supervisor`]: background work whose failures are always observed
//! - [`fan_out`]: concurrent launch with an ordered, wait-for-all join
//! - [`bridge`]: blocking on async work from synchronous code
//! - [`telemetry`]: where captured failures are recorded
//! - [`error`]: error types shared by all of the above

pub mod bridge;
pub mod cache;
pub mod cancellation;
pub mod error;
pub mod fan_out;
pub mod supervisor;
pub mod telemetry;
