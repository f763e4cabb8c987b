//! GridPulse - Minimal master/worker compute-distribution engine
//!
//! GridPulse splits a numeric workload into independent subtasks,
//! discovers worker processes on the local network, and drives the
//! workload to completion over persistent TCP connections.
//!
//! # Architecture
//!
//! - **Discovery**: connectionless UDP broadcast probe / reply exchange
//! - **Coordinator**: event-driven dispatch loop with reconnection and
//!   reassignment on worker failure
//! - **Worker**: long-lived daemon answering probes and serving tasks
//! - **Compute**: interchangeable work function (numeric integration)

pub mod compute;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod protocol;
pub mod registry;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::Coordinator;
pub use worker::WorkerService;

/// Result type used throughout GridPulse
pub type Result<T> = anyhow::Result<T>;
