//! testrun - client for a remote test-orchestration service
//!
//! Schedules test and suite executions and watches them to a terminal
//! verdict, reconciling the service's push-based log stream with a
//! pull-based status poll.

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod report;
pub mod verdict;
pub mod watch;

// Re-export commonly used types for tests
pub use common::{Error, Result};
