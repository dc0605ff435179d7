//! Status polling
//!
//! The poll loop is a redundant safety net for a flaky log stream, so a
//! failed fetch is reported as queued instead of surfacing an error.

use std::time::Duration;

use crate::api::types::ExecutionStatus;

use super::WatchTransport;

/// Interval between status polls while watching a single test
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Interval between detail fetches while watching a suite
pub const SUITE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Fetch the current status, substituting queued for any failure
pub async fn poll_status(transport: &dyn WatchTransport, execution_id: &str) -> ExecutionStatus {
    match transport.execution_status(execution_id).await {
        Ok(status) => status,
        Err(error) => {
            tracing::debug!(%execution_id, %error, "status poll failed, treating as queued");
            ExecutionStatus::Queued
        }
    }
}
