//! CLI command definitions
//!
//! Defines the clap commands for the testrun CLI.

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule a test execution and watch it until it finishes
    Test {
        /// Test id on the orchestration service
        id: String,

        /// Git revision to run the test content from
        #[arg(long = "ref", value_name = "COMMIT")]
        git_ref: Option<String>,

        /// Script to run inside the execution before the test starts
        #[arg(long)]
        pre_run_script: Option<String>,

        /// Namespace to schedule the execution in
        #[arg(long)]
        namespace: Option<String>,

        #[command(flatten)]
        execution: ExecutionArgs,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Schedule a test suite execution and watch it until it finishes
    Suite {
        /// Suite id on the orchestration service
        id: String,

        #[command(flatten)]
        execution: ExecutionArgs,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

/// Options shared by every schedule request
#[derive(Args)]
pub struct ExecutionArgs {
    /// Name for the scheduled execution (server-generated if omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Variable passed to the execution (repeatable)
    #[arg(long = "variable", short = 'v', value_name = "NAME=VALUE")]
    pub variables: Vec<String>,

    /// Secret variable passed to the execution (repeatable)
    #[arg(long = "secret-variable", short = 's', value_name = "NAME=VALUE")]
    pub secret_variables: Vec<String>,
}

/// Connection options shared by every command
///
/// Anything left unset falls back to the config file.
#[derive(Args)]
pub struct ConnectionArgs {
    /// Base URL of the orchestration API
    #[arg(long)]
    pub url: Option<String>,

    /// WebSocket base URL (defaults to the API URL)
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Dashboard base URL used for deep links
    #[arg(long)]
    pub dashboard_url: Option<String>,

    /// Cloud organization id
    #[arg(long)]
    pub organization: Option<String>,

    /// Cloud environment id
    #[arg(long)]
    pub environment: Option<String>,

    /// API token, also attached to the log stream
    #[arg(long)]
    pub token: Option<String>,
}
