//! Watch coordination
//!
//! Races the push-based log stream against the status poll and resolves
//! once, with whichever signal reports a terminal status first. Stream
//! trouble is never fatal: transport errors reconnect immediately, and a
//! clean-looking close is re-verified against the service before it is
//! trusted, with a backoff reconnect when the execution turns out to still
//! be running.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::api::types::{ExecutionResult, ExecutionStatus};
use crate::common::Result;
use crate::report;

use super::poll::{self, POLL_INTERVAL, SUITE_POLL_INTERVAL};
use super::session::{StepProgress, WatchSession};
use super::stream::{parse_message, StreamEvent};
use super::{LogStream, WatchTransport};

/// Delay before reconnecting after a close that did not prove terminal
const RECONNECT_BACKOFF: Duration = Duration::from_millis(5000);

/// Watch a single test execution until it reaches a terminal status
///
/// Returns the first terminal result either channel observed. The stream may
/// carry an error message; the poll only ever reports a bare status.
pub async fn watch_test(
    transport: &dyn WatchTransport,
    execution_id: &str,
) -> Result<ExecutionResult> {
    let mut session = WatchSession::new(execution_id);
    let mut reconnect_at: Option<Instant> = None;
    let mut stream = match transport.open_logs_socket(execution_id).await {
        Ok(stream) => Some(stream),
        Err(error) => {
            tracing::debug!(%execution_id, %error, "log stream connect failed");
            reconnect_at = Some(Instant::now() + RECONNECT_BACKOFF);
            None
        }
    };

    let mut poll = time::interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = next_event(stream.as_mut()) => match event {
                Some(StreamEvent::Message(text)) => {
                    let parsed = parse_message(&text);
                    if let Some(output) = &parsed.output {
                        report::log(output);
                    }
                    if let Some(terminal) = parsed.terminal {
                        report::stream_terminal(terminal.status, terminal.error_message.as_deref());
                        if session.finalize() {
                            tracing::debug!(
                                id = %session.execution_id(),
                                status = %terminal.status,
                                "watch finalized by stream"
                            );
                            return Ok(ExecutionResult {
                                status: terminal.status,
                                error_message: terminal.error_message,
                            });
                        }
                    }
                }
                Some(StreamEvent::Failed(error)) => {
                    // The service is known to drop the stream with bogus errors
                    // while the execution keeps running
                    tracing::debug!(%execution_id, %error, "log stream error");
                    report::note("Reconnecting...");
                    stream = reopen(transport, execution_id, &mut reconnect_at).await;
                }
                None => {
                    // Clean close is ambiguous between "finished" and
                    // "dropped": re-verify before trusting it
                    stream = None;
                    let status = poll::poll_status(transport, execution_id).await;
                    if status.is_terminal() {
                        if session.finalize() {
                            tracing::debug!(
                                id = %session.execution_id(),
                                %status,
                                "watch finalized on stream close"
                            );
                            return Ok(ExecutionResult { status, error_message: None });
                        }
                    } else {
                        tracing::debug!(%execution_id, %status, "stream closed while non-terminal");
                        reconnect_at = Some(Instant::now() + RECONNECT_BACKOFF);
                    }
                }
            },
            _ = reconnect_delay(reconnect_at) => {
                reconnect_at = None;
                stream = reopen(transport, execution_id, &mut reconnect_at).await;
            }
            _ = poll.tick() => {
                let status = poll::poll_status(transport, execution_id).await;
                if status.is_terminal() && session.finalize() {
                    tracing::debug!(
                        id = %session.execution_id(),
                        %status,
                        "watch finalized by poll"
                    );
                    return Ok(ExecutionResult { status, error_message: None });
                }
            }
        }
    }
}

/// Watch a suite execution, reporting step transitions as they appear
///
/// Suites have no log stream; progress is polled from the execution details,
/// one line per step the first time it is seen in each non-queued status.
pub async fn watch_suite(
    transport: &dyn WatchTransport,
    execution_id: &str,
) -> Result<ExecutionStatus> {
    let mut progress = StepProgress::default();
    let mut poll = time::interval_at(
        Instant::now() + SUITE_POLL_INTERVAL,
        SUITE_POLL_INTERVAL,
    );
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        poll.tick().await;
        let execution = transport.suite_execution(execution_id).await?;
        for (index, step) in execution.steps.iter().enumerate() {
            let status = step.result.status;
            if status == ExecutionStatus::Queued {
                continue;
            }
            if progress.mark(index, status) {
                report::step_progress(status, &step.spec.label());
            }
        }
        if execution.status.is_terminal() {
            return Ok(execution.status);
        }
    }
}

async fn next_event(stream: Option<&mut LogStream>) -> Option<StreamEvent> {
    match stream {
        Some(stream) => stream.recv().await,
        None => future::pending().await,
    }
}

async fn reconnect_delay(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

async fn reopen(
    transport: &dyn WatchTransport,
    execution_id: &str,
    reconnect_at: &mut Option<Instant>,
) -> Option<LogStream> {
    match transport.open_logs_socket(execution_id).await {
        Ok(stream) => Some(stream),
        Err(error) => {
            tracing::debug!(%execution_id, %error, "log stream connect failed");
            *reconnect_at = Some(Instant::now() + RECONNECT_BACKOFF);
            None
        }
    }
}
