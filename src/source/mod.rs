//! Counter sources for monitored processes.
//!
//! The sampler only depends on the [`CounterSource`](crate::core::CounterSource)
//! trait; this module holds the concrete implementations and their error type.

pub mod jolokia;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use thiserror::Error;

pub use jolokia::JolokiaSource;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("unable to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("counter read failed: {0}")]
    Read(String),

    #[error("counter source is not connected")]
    NotConnected,
}
