//! Execution watching
//!
//! One watch session races two independent, unreliable signals (the
//! push-based log stream and the pull-based status poll) and resolves with
//! whichever reports a terminal status first. The transport is a trait so
//! the coordination logic can be driven by a scripted service in tests.

pub mod coordinator;
pub mod poll;
pub mod session;
pub mod stream;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::types::{ExecutionStatus, SuiteExecution};
use crate::common::Result;
use stream::StreamEvent;

/// Receiving side of one log stream connection
///
/// Ends without a `Failed` event when the server closed the stream cleanly.
pub type LogStream = mpsc::UnboundedReceiver<StreamEvent>;

/// What the watch subsystem needs from the service
#[async_trait]
pub trait WatchTransport: Send + Sync {
    /// Open a push channel streaming logs for an execution
    async fn open_logs_socket(&self, execution_id: &str) -> Result<LogStream>;

    /// Fetch the current status of a single test execution
    async fn execution_status(&self, execution_id: &str) -> Result<ExecutionStatus>;

    /// Fetch the details of a suite execution
    async fn suite_execution(&self, execution_id: &str) -> Result<SuiteExecution>;
}

/// Watch a test execution until it reaches a terminal status
///
/// Progress is reported as a side effect; the caller re-fetches the final
/// details afterwards for the printable verdict.
pub async fn watch(transport: &dyn WatchTransport, execution_id: &str) -> Result<()> {
    coordinator::watch_test(transport, execution_id)
        .await
        .map(|_| ())
}
