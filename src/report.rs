//! Console reporting
//!
//! All human-facing lines go through here so the run output reads the same
//! everywhere; diagnostics use `tracing` instead and stay on stderr.

use colored::Colorize;

use crate::api::types::ExecutionStatus;
use crate::verdict::Verdict;

/// Section header
pub fn header(text: &str) {
    println!("{}", format!("⸻ {text}").magenta().bold());
}

/// A streamed or informational line
pub fn log(text: &str) {
    println!("{}", text.dimmed());
}

/// A transient note, e.g. reconnect announcements
pub fn note(text: &str) {
    println!("{}", text.italic());
}

/// Terminal signal observed on the log stream
pub fn stream_terminal(status: ExecutionStatus, error_message: Option<&str>) {
    if status.is_success() {
        log("Test run succeeded");
    } else {
        let message = error_message.filter(|m| !m.is_empty()).unwrap_or("failure");
        log(&format!("Test run failed: {message}"));
    }
}

/// One suite step transition
pub fn step_progress(status: ExecutionStatus, label: &str) {
    let line = format!("[{status}] {label}");
    let line = match status {
        ExecutionStatus::Passed => line.green(),
        ExecutionStatus::Running | ExecutionStatus::Queued => line.dimmed(),
        _ => line.red(),
    };
    println!("{line}");
}

/// Final verdict line
pub fn verdict(verdict: &Verdict) {
    if verdict.status.is_success() {
        println!("{}", "✔ The run was successful".green().bold());
    } else if verdict.status.is_cancellation() {
        println!("{}", "× The run has been cancelled".red().bold());
    } else {
        let message = if verdict.error_message.is_empty() {
            "failure"
        } else {
            verdict.error_message.as_str()
        };
        println!("{}", format!("× The run has failed: {message}").red().bold());
    }
}

/// Clarification for targets that declare an expected failure
///
/// The service inverts the verdict for those, so "passed" means the test
/// failed the way it was supposed to.
pub fn negative_test_note(status: ExecutionStatus) {
    if status.is_success() {
        println!(
            "{}",
            "  The run was expected to fail, and it failed as expected".italic()
        );
    } else if status == ExecutionStatus::Failed {
        println!(
            "{}",
            "  The run was expected to fail, but it succeeded".italic()
        );
    }
}

/// Fatal error line
pub fn critical(error: &dyn std::fmt::Display) {
    eprintln!("{} {error}", "Error:".red().bold());
}
