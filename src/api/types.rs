//! Wire types for the orchestration API
//!
//! Status tokens and execution shapes mirror what the service actually sends.
//! Suite executions arrive in two schema revisions (flat step results vs
//! grouped); both are normalized here into one flat step sequence so nothing
//! downstream branches on the revision.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Result;

/// Content types that allow overriding the Git revision
pub const GIT_CONTENT_TYPES: &[&str] = &["git", "git-dir", "git-file"];

/// Execution status as reported by the orchestration service
///
/// Unknown or missing tokens deserialize as `Queued`: the watcher must keep
/// waiting for a recognized status rather than crash or wedge on one it
/// doesn't know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ExecutionStatus {
    #[default]
    Queued,
    Running,
    Passed,
    Failed,
    Cancelled,
    Aborted,
    #[serde(rename = "timeout")]
    TimedOut,
}

impl ExecutionStatus {
    /// Classify a raw status token
    pub fn parse(token: &str) -> Self {
        match token {
            "running" => Self::Running,
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "aborted" => Self::Aborted,
            "timeout" => Self::TimedOut,
            _ => Self::Queued,
        }
    }

    /// Whether no further state changes can occur
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    /// Terminal success
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Terminal statuses reported as a failed verdict
    pub fn is_failure_class(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Cancelled | Self::Aborted | Self::TimedOut
        )
    }

    /// Terminal statuses reported with "cancelled" wording
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::Cancelled | Self::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
            Self::TimedOut => "timeout",
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of an execution
///
/// `error_message` is only meaningful for failure-class statuses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A variable passed to an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Basic,
    Secret,
}

/// Details of a test or suite as defined on the service
///
/// Only the fields the run flow consults are modeled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    #[serde(default)]
    pub execution_request: Option<ExecutionRequest>,
    #[serde(default)]
    pub content: Option<ContentInfo>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    #[serde(default)]
    pub negative_test: bool,
    #[serde(default)]
    pub variables: HashMap<String, Variable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentInfo {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

/// Details of a test source referenced by a test
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDetails {
    #[serde(rename = "type")]
    pub source_type: Option<String>,
}

/// Body of a schedule request
///
/// Suites ignore the test-only fields; they are left unset for them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_run_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, Variable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_request: Option<ContentRequest>,
    pub running_context: RunningContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentRequest {
    pub repository: RepositoryRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Tag identifying where an execution was scheduled from
#[derive(Debug, Clone, Serialize)]
pub struct RunningContext {
    #[serde(rename = "type")]
    pub kind: String,
    pub context: String,
}

impl Default for RunningContext {
    fn default() -> Self {
        Self {
            kind: "cli".to_string(),
            context: format!("testrun-cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Details of a single test execution
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionDetails {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub execution_result: ExecutionResult,
}

/// One step of a suite, normalized from either schema revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSpec {
    /// Runs a named test
    Test { name: String },
    /// Waits for a duration
    Delay { duration_ms: u64 },
}

impl StepSpec {
    /// Extract a step descriptor from the raw step object of any revision
    fn parse(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::Test {
                name: String::new(),
            };
        };
        if let Some(delay) = value.get("delay") {
            if let Some(ms) = delay.get("duration").and_then(Value::as_u64).or_else(|| delay.as_u64()) {
                return Self::Delay { duration_ms: ms };
            }
        }
        if let Some(name) = value.get("test").and_then(Value::as_str) {
            return Self::Test { name: name.to_string() };
        }
        // V2 carries an `execute` object (or singleton array) instead
        if let Some(execute) = value.get("execute") {
            let item = if execute.is_array() {
                execute.get(0)
            } else {
                Some(execute)
            };
            if let Some(item) = item {
                if let Some(name) = item.get("name").and_then(Value::as_str) {
                    return Self::Test { name: name.to_string() };
                }
                if let Some(ms) = item.get("duration").and_then(Value::as_u64) {
                    return Self::Delay { duration_ms: ms };
                }
            }
        }
        if let Some(name) = value.get("name").and_then(Value::as_str) {
            return Self::Test { name: name.to_string() };
        }
        Self::Test {
            name: String::new(),
        }
    }

    /// Human-readable label for progress lines
    pub fn label(&self) -> String {
        match self {
            Self::Test { name } => name.clone(),
            Self::Delay { duration_ms } => format!("🕑 {duration_ms}ms"),
        }
    }
}

/// Result of one suite step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub spec: StepSpec,
    pub result: ExecutionResult,
}

/// A suite execution with its steps flattened into one ordered sequence
#[derive(Debug, Clone)]
pub struct SuiteExecution {
    pub id: String,
    pub name: String,
    pub status: ExecutionStatus,
    pub steps: Vec<StepOutcome>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuiteExecutionV3 {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: ExecutionStatus,
    #[serde(default)]
    execute_step_results: Vec<RawStepGroup>,
}

#[derive(Debug, Deserialize)]
struct RawStepGroup {
    #[serde(default)]
    execute: Vec<RawStepResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuiteExecutionV2 {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: ExecutionStatus,
    #[serde(default)]
    step_results: Vec<RawStepResult>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStepResult {
    #[serde(default)]
    step: Option<Value>,
    #[serde(default)]
    execution: RawExecution,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExecution {
    #[serde(default)]
    execution_result: ExecutionResult,
}

/// Parse a suite execution of either schema revision into the normalized form
///
/// The V2 revision is recognized by its flat `stepResults` field; everything
/// else is treated as V3 with grouped `executeStepResults`.
pub fn parse_suite_execution(value: Value) -> Result<SuiteExecution> {
    if value.get("stepResults").is_some() {
        let raw: RawSuiteExecutionV2 = serde_json::from_value(value)?;
        Ok(SuiteExecution {
            id: raw.id,
            name: raw.name,
            status: raw.status,
            steps: raw.step_results.into_iter().map(step_outcome).collect(),
        })
    } else {
        let raw: RawSuiteExecutionV3 = serde_json::from_value(value)?;
        Ok(SuiteExecution {
            id: raw.id,
            name: raw.name,
            status: raw.status,
            steps: raw
                .execute_step_results
                .into_iter()
                .flat_map(|group| group.execute)
                .map(step_outcome)
                .collect(),
        })
    }
}

fn step_outcome(raw: RawStepResult) -> StepOutcome {
    StepOutcome {
        spec: StepSpec::parse(raw.step.as_ref()),
        result: raw.execution.execution_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_statuses_classify_terminal() {
        for token in ["passed", "failed", "cancelled", "aborted", "timeout"] {
            assert!(ExecutionStatus::parse(token).is_terminal(), "{token}");
        }
    }

    #[test]
    fn non_terminal_statuses_classify_non_terminal() {
        for token in ["running", "queued", "suspended", ""] {
            assert!(!ExecutionStatus::parse(token).is_terminal(), "{token}");
        }
    }

    #[test]
    fn unknown_token_falls_back_to_queued() {
        assert_eq!(ExecutionStatus::parse("exploded"), ExecutionStatus::Queued);
    }

    #[test]
    fn missing_status_deserializes_as_queued() {
        let result: ExecutionResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(result.status, ExecutionStatus::Queued);
    }

    #[test]
    fn failure_class_covers_all_failed_like_statuses() {
        assert!(ExecutionStatus::Failed.is_failure_class());
        assert!(ExecutionStatus::Cancelled.is_failure_class());
        assert!(ExecutionStatus::Aborted.is_failure_class());
        assert!(ExecutionStatus::TimedOut.is_failure_class());
        assert!(!ExecutionStatus::Passed.is_failure_class());
        assert!(!ExecutionStatus::Running.is_failure_class());
    }

    #[test]
    fn parses_v3_grouped_steps_in_order() {
        let execution = parse_suite_execution(json!({
            "id": "s1",
            "name": "nightly",
            "status": "failed",
            "executeStepResults": [
                {"execute": [
                    {"step": {"test": "login"}, "execution": {"executionResult": {"status": "failed", "errorMessage": "boom"}}},
                    {"step": {"test": "login-retry"}, "execution": {"executionResult": {"status": "passed"}}}
                ]},
                {"execute": [
                    {"step": {"delay": {"duration": 500}}, "execution": {"executionResult": {"status": "passed"}}}
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.steps.len(), 3);
        assert_eq!(
            execution.steps[0].spec,
            StepSpec::Test { name: "login".to_string() }
        );
        assert_eq!(
            execution.steps[2].spec,
            StepSpec::Delay { duration_ms: 500 }
        );
    }

    #[test]
    fn parses_v2_flat_steps() {
        let execution = parse_suite_execution(json!({
            "id": "s2",
            "status": "passed",
            "stepResults": [
                {"step": {"execute": {"name": "smoke"}}, "execution": {"executionResult": {"status": "passed"}}},
                {"step": {"execute": [{"duration": 1000}]}, "execution": {"executionResult": {"status": "passed"}}}
            ]
        }))
        .unwrap();

        assert_eq!(execution.steps.len(), 2);
        assert_eq!(
            execution.steps[0].spec,
            StepSpec::Test { name: "smoke".to_string() }
        );
        assert_eq!(
            execution.steps[1].spec,
            StepSpec::Delay { duration_ms: 1000 }
        );
    }

    #[test]
    fn delay_label_shows_duration() {
        let spec = StepSpec::Delay { duration_ms: 750 };
        assert_eq!(spec.label(), "🕑 750ms");
    }
}
