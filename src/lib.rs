//! jvmwatch - samples a running JVM and ships its utilization figures
//!
//! The library attaches to a process through a [`CounterSource`], turns
//! monotonic counters into CPU and garbage-collection load figures, and hands
//! each [`Snapshot`] to a [`Transport`] (stdout, GELF over TCP or UDP).

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod formatting;
pub mod gc;
pub mod internal_metrics;
pub mod monitor;
pub mod outputs;
pub mod rates;
pub mod sampler;
pub mod source;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
