//! testrun CLI - schedule a remote test or suite execution and watch it
//! to a terminal verdict.

use clap::Parser;
use testrun::{cli, commands::Commands, common::logging, report};

#[derive(Parser)]
#[command(name = "testrun", about = "Schedule and watch remote test executions")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    logging::init();

    let cli = Cli::parse();

    match cli::dispatch(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report::critical(&e);
            std::process::exit(1);
        }
    }
}
