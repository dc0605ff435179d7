//! Watch coordination tests
//!
//! Drives the coordinator through a scripted transport to exercise the
//! signal races the real service produces: flaky streams, ambiguous closes
//! and the poll loop acting as the escape hatch. Time is paused, so the
//! poll interval and reconnect backoff elapse instantly and in order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};

use testrun::api::types::{
    ExecutionResult, ExecutionStatus, StepOutcome, StepSpec, SuiteExecution,
};
use testrun::common::{Error, Result};
use testrun::watch::coordinator;
use testrun::watch::stream::StreamEvent;
use testrun::watch::{LogStream, WatchTransport};

/// What one `open_logs_socket` call should produce
enum StreamScript {
    /// Deliver the events, then close cleanly
    Close(Vec<StreamEvent>),
    /// Deliver the events, then keep the connection open
    Hold(Vec<StreamEvent>),
    /// Refuse the connection
    Refuse,
}

/// Transport whose every answer is scripted up front
struct ScriptedTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    statuses: Mutex<VecDeque<ExecutionStatus>>,
    snapshots: Mutex<VecDeque<SuiteExecution>>,
    opens: AtomicUsize,
    polls: AtomicUsize,
    suite_polls: AtomicUsize,
    held: Mutex<Vec<UnboundedSender<StreamEvent>>>,
}

impl ScriptedTransport {
    /// Streams are consumed per connection; the last status repeats forever
    fn new(streams: Vec<StreamScript>, statuses: Vec<ExecutionStatus>) -> Self {
        Self {
            streams: Mutex::new(streams.into()),
            statuses: Mutex::new(statuses.into()),
            snapshots: Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            suite_polls: AtomicUsize::new(0),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Suite snapshots are consumed per fetch; the last one repeats forever
    fn with_snapshots(snapshots: Vec<SuiteExecution>) -> Self {
        let transport = Self::new(Vec::new(), Vec::new());
        *transport.snapshots.lock().unwrap() = snapshots.into();
        transport
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn suite_polls(&self) -> usize {
        self.suite_polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WatchTransport for ScriptedTransport {
    async fn open_logs_socket(&self, _execution_id: &str) -> Result<LogStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.streams.lock().unwrap().pop_front();
        let (tx, rx) = mpsc::unbounded_channel();
        match script {
            Some(StreamScript::Refuse) => {
                return Err(Error::Api("connection refused".to_string()))
            }
            Some(StreamScript::Close(events)) => {
                for event in events {
                    let _ = tx.send(event);
                }
                // tx drops here: the stream ends cleanly after the events
            }
            Some(StreamScript::Hold(events)) => {
                for event in events {
                    let _ = tx.send(event);
                }
                self.held.lock().unwrap().push(tx);
            }
            None => {
                self.held.lock().unwrap().push(tx);
            }
        }
        Ok(rx)
    }

    async fn execution_status(&self, _execution_id: &str) -> Result<ExecutionStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            Ok(statuses.pop_front().unwrap_or_default())
        } else {
            Ok(statuses.front().copied().unwrap_or_default())
        }
    }

    async fn suite_execution(&self, _execution_id: &str) -> Result<SuiteExecution> {
        self.suite_polls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        if snapshots.len() > 1 {
            snapshots
                .pop_front()
                .ok_or_else(|| Error::Api("no snapshot scripted".to_string()))
        } else {
            snapshots
                .front()
                .cloned()
                .ok_or_else(|| Error::Api("no snapshot scripted".to_string()))
        }
    }
}

fn message(json: &str) -> StreamEvent {
    StreamEvent::Message(json.to_string())
}

fn snapshot(status: ExecutionStatus, steps: &[(ExecutionStatus, &str)]) -> SuiteExecution {
    SuiteExecution {
        id: "s1".to_string(),
        name: "suite".to_string(),
        status,
        steps: steps
            .iter()
            .map(|(status, name)| StepOutcome {
                spec: StepSpec::Test {
                    name: name.to_string(),
                },
                result: ExecutionResult {
                    status: *status,
                    error_message: None,
                },
            })
            .collect(),
    }
}

#[tokio::test(start_paused = true)]
async fn poll_resolves_before_any_stream_message() {
    // The stream opens but stays silent; the poll is the only signal
    let transport = ScriptedTransport::new(vec![], vec![ExecutionStatus::Passed]);

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Passed);
    assert_eq!(transport.opens(), 1);
    // Resolved on the first tick; the timer was cancelled with it
    assert_eq!(transport.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stream_error_then_terminal_resolves_once() {
    let transport = ScriptedTransport::new(
        vec![
            StreamScript::Hold(vec![StreamEvent::Failed("connection reset".to_string())]),
            StreamScript::Hold(vec![message(
                r#"{"result":{"output":"boom"},"status":"failed","errorMessage":"x"}"#,
            )]),
        ],
        vec![ExecutionStatus::Queued],
    );

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error_message.as_deref(), Some("x"));
    // The error cost one reconnect and nothing else
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn first_terminal_signal_wins() {
    // The stream reports failed immediately; the poll would say passed,
    // but it never gets the chance
    let transport = ScriptedTransport::new(
        vec![StreamScript::Hold(vec![message(
            r#"{"output":"died","status":"failed","errorMessage":"boom"}"#,
        )])],
        vec![ExecutionStatus::Passed],
    );

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error_message.as_deref(), Some("boom"));
}

#[tokio::test(start_paused = true)]
async fn clean_close_while_running_reconnects_after_backoff() {
    let transport = ScriptedTransport::new(
        vec![
            StreamScript::Close(vec![]),
            StreamScript::Hold(vec![message(r#"{"output":"done","status":"passed"}"#)]),
        ],
        vec![ExecutionStatus::Queued],
    );

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Passed);
    // The close was re-verified, found non-terminal and reconnected
    assert_eq!(transport.opens(), 2);
    assert!(transport.polls() >= 1);
}

#[tokio::test(start_paused = true)]
async fn clean_close_after_terminal_status_finalizes_without_reconnect() {
    let transport = ScriptedTransport::new(
        vec![StreamScript::Close(vec![message(r#"{"output":"all good"}"#)])],
        vec![ExecutionStatus::Passed],
    );

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Passed);
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn refused_connection_retries_until_terminal() {
    let transport = ScriptedTransport::new(
        vec![
            StreamScript::Refuse,
            StreamScript::Hold(vec![message(r#"{"output":"done","status":"passed"}"#)]),
        ],
        vec![ExecutionStatus::Queued],
    );

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Passed);
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_stream_messages_do_not_end_the_watch() {
    let transport = ScriptedTransport::new(
        vec![StreamScript::Hold(vec![
            message("plain text chunk"),
            message(r#"{"status":"failed"}"#),
            message(r#"{"output":"done","status":"passed"}"#),
        ])],
        vec![ExecutionStatus::Queued],
    );

    let result = coordinator::watch_test(&transport, "E1").await.unwrap();

    // Only the message carrying output and a terminal status ended it
    assert_eq!(result.status, ExecutionStatus::Passed);
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn suite_watch_reports_steps_until_terminal() {
    let transport = ScriptedTransport::with_snapshots(vec![
        snapshot(
            ExecutionStatus::Running,
            &[
                (ExecutionStatus::Running, "login"),
                (ExecutionStatus::Queued, "checkout"),
            ],
        ),
        snapshot(
            ExecutionStatus::Running,
            &[
                (ExecutionStatus::Passed, "login"),
                (ExecutionStatus::Running, "checkout"),
            ],
        ),
        snapshot(
            ExecutionStatus::Passed,
            &[
                (ExecutionStatus::Passed, "login"),
                (ExecutionStatus::Passed, "checkout"),
            ],
        ),
    ]);

    let status = coordinator::watch_suite(&transport, "S1").await.unwrap();

    assert_eq!(status, ExecutionStatus::Passed);
    assert_eq!(transport.suite_polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn suite_watch_propagates_fetch_errors() {
    let transport = ScriptedTransport::new(vec![], vec![]);

    let result = coordinator::watch_suite(&transport, "S1").await;

    assert!(matches!(result, Err(Error::Api(_))));
}
