//! Verdict aggregation

use crate::api::types::{ExecutionStatus, SuiteExecution, TestExecutionDetails};

/// Final verdict of a run
///
/// `error_message` is always present, possibly empty; the display layer
/// substitutes "failure" for an empty message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: ExecutionStatus,
    pub error_message: String,
}

impl From<&TestExecutionDetails> for Verdict {
    fn from(details: &TestExecutionDetails) -> Self {
        Self {
            status: details.execution_result.status,
            error_message: details
                .execution_result
                .error_message
                .clone()
                .unwrap_or_default(),
        }
    }
}

/// Reduce a suite execution to one verdict
///
/// The status comes from the suite's own top-level status field; only the
/// message is derived, by joining the failure-class steps' messages in step
/// order.
pub fn aggregate(execution: &SuiteExecution) -> Verdict {
    let error_message = execution
        .steps
        .iter()
        .filter(|step| step.result.status.is_failure_class())
        .filter_map(|step| step.result.error_message.as_deref())
        .filter(|message| !message.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    Verdict {
        status: execution.status,
        error_message,
    }
}
