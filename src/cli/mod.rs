//! CLI command handling
//!
//! Resolves the connection, schedules the execution, watches it to a
//! terminal status and prints the verdict. The exit code is derived from
//! the final classification, not from how the watch got there.

use std::collections::HashMap;
use std::time::Duration;

use crate::api::connection::Connection;
use crate::api::instances::{self, ConnectionOptions};
use crate::api::types::{
    ContentRequest, RepositoryRequest, RunningContext, ScheduleRequest, TargetDetails, Variable,
    VariableKind, GIT_CONTENT_TYPES,
};
use crate::commands::{Commands, ConnectionArgs, ExecutionArgs};
use crate::common::{config::Config, Error, Result};
use crate::report;
use crate::verdict::{self, Verdict};
use crate::watch::{self, coordinator};

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Test {
            id,
            git_ref,
            pre_run_script,
            namespace,
            execution,
            connection,
        } => {
            run(
                Target::Test {
                    id,
                    git_ref,
                    pre_run_script,
                    namespace,
                },
                execution,
                connection,
            )
            .await
        }
        Commands::Suite {
            id,
            execution,
            connection,
        } => run(Target::Suite { id }, execution, connection).await,
    }
}

enum Target {
    Test {
        id: String,
        git_ref: Option<String>,
        pre_run_script: Option<String>,
        namespace: Option<String>,
    },
    Suite {
        id: String,
    },
}

async fn run(
    target: Target,
    execution_args: ExecutionArgs,
    connection_args: ConnectionArgs,
) -> Result<i32> {
    let options = connection_options(connection_args)?;

    report::header("Obtaining details");
    let config = instances::resolve(&options).await?;
    let client = Connection::new(config.clone());

    let details = match &target {
        Target::Test { id, .. } => client.get_test(id).await?,
        Target::Suite { id } => client.get_suite(id).await?,
    };

    if let Target::Test {
        git_ref: Some(_), ..
    } = &target
    {
        ensure_git_sourced(&client, &details).await?;
    }

    report::header("Scheduling execution");
    let request = ScheduleRequest {
        name: execution_args.name.clone(),
        namespace: match &target {
            Target::Test { namespace, .. } => namespace.clone(),
            Target::Suite { .. } => None,
        },
        pre_run_script: match &target {
            Target::Test { pre_run_script, .. } => pre_run_script.clone(),
            Target::Suite { .. } => None,
        },
        variables: merge_variables(&details, &execution_args)?,
        content_request: match &target {
            Target::Test {
                git_ref: Some(commit),
                ..
            } => Some(ContentRequest {
                repository: RepositoryRequest {
                    commit: Some(commit.clone()),
                },
            }),
            _ => None,
        },
        running_context: RunningContext::default(),
    };

    let (execution_id, execution_name) = match &target {
        Target::Test { id, .. } => {
            let scheduled = client.schedule_test(id, &request).await?;
            (scheduled.id, scheduled.name)
        }
        Target::Suite { id } => {
            let scheduled = client.schedule_suite(id, &request).await?;
            (scheduled.id, scheduled.name)
        }
    };

    report::log(&format!(
        "Execution scheduled: {execution_name} ({execution_id})"
    ));
    if let Some(dashboard) = &config.dashboard_url {
        let link = match &target {
            Target::Test { id, .. } => {
                format!("{dashboard}/tests/executions/{id}/execution/{execution_id}")
            }
            Target::Suite { id } => {
                format!("{dashboard}/test-suites/executions/{id}/execution/{execution_id}")
            }
        };
        report::log(&format!("Dashboard URL: {link}"));
    }

    report::header("Attaching to logs");
    match &target {
        Target::Test { .. } => watch::watch(&client, &execution_id).await?,
        Target::Suite { .. } => {
            coordinator::watch_suite(&client, &execution_id).await?;
        }
    }

    report::header("Obtaining results");
    // Give the server-side record a moment to settle after the watch ends
    tokio::time::sleep(Duration::from_millis(500)).await;
    let verdict = match &target {
        Target::Test { .. } => Verdict::from(&client.get_test_execution(&execution_id).await?),
        Target::Suite { .. } => verdict::aggregate(&client.get_suite_execution(&execution_id).await?),
    };

    report::verdict(&verdict);
    if details
        .execution_request
        .as_ref()
        .is_some_and(|r| r.negative_test)
    {
        report::negative_test_note(verdict.status);
    }

    Ok(if verdict.status.is_success() { 0 } else { 1 })
}

/// Merge CLI flags over the config file and validate the combination
fn connection_options(args: ConnectionArgs) -> Result<ConnectionOptions> {
    let file = Config::load()?;
    let options = ConnectionOptions {
        url: args.url.or(file.url),
        ws_url: args.ws_url.or(file.ws_url),
        dashboard_url: args.dashboard_url.or(file.dashboard_url),
        organization: args.organization.or(file.organization),
        environment: args.environment.or(file.environment),
        token: args.token.or(file.token),
    };

    let cloud_parts = [
        options.organization.is_some(),
        options.environment.is_some(),
        options.token.is_some(),
    ];
    if cloud_parts.iter().any(|p| *p) && !cloud_parts.iter().all(|p| *p) {
        return Err(Error::IncompleteCloudCredentials);
    }
    if options.organization.is_none() && options.url.is_none() {
        return Err(Error::MissingEndpoint);
    }

    Ok(options)
}

/// Reject a git-ref override unless the test content comes from Git
async fn ensure_git_sourced(client: &Connection, details: &TargetDetails) -> Result<()> {
    let content_type = match details.content.as_ref().and_then(|c| c.content_type.clone()) {
        Some(content_type) => Some(content_type),
        None => match &details.source {
            Some(source_id) => client.get_source(source_id).await?.source_type,
            None => None,
        },
    };
    if !content_type
        .as_deref()
        .is_some_and(|t| GIT_CONTENT_TYPES.contains(&t))
    {
        return Err(Error::GitRefUnsupported);
    }
    Ok(())
}

fn merge_variables(
    details: &TargetDetails,
    args: &ExecutionArgs,
) -> Result<Option<HashMap<String, Variable>>> {
    let basic = parse_variables(&args.variables, VariableKind::Basic)?;
    let secret = parse_variables(&args.secret_variables, VariableKind::Secret)?;
    if basic.is_empty() && secret.is_empty() {
        return Ok(None);
    }

    let mut merged = details
        .execution_request
        .as_ref()
        .map(|r| r.variables.clone())
        .unwrap_or_default();
    merged.extend(basic);
    merged.extend(secret);
    Ok(Some(merged))
}

fn parse_variables(
    entries: &[String],
    kind: VariableKind,
) -> Result<HashMap<String, Variable>> {
    entries
        .iter()
        .map(|entry| {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::InvalidVariable(entry.clone()))?;
            Ok((
                name.to_string(),
                Variable {
                    name: name.to_string(),
                    kind,
                    value: Some(value.to_string()),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_parse_name_value_pairs() {
        let vars =
            parse_variables(&["FOO=bar".to_string(), "URL=a=b".to_string()], VariableKind::Basic)
                .unwrap();
        assert_eq!(vars["FOO"].value.as_deref(), Some("bar"));
        // Only the first '=' splits, values may contain more
        assert_eq!(vars["URL"].value.as_deref(), Some("a=b"));
    }

    #[test]
    fn variables_without_separator_are_rejected() {
        let result = parse_variables(&["FOO".to_string()], VariableKind::Basic);
        assert!(matches!(result, Err(Error::InvalidVariable(_))));
    }

    #[test]
    fn cli_variables_override_predefined_ones() {
        let details = TargetDetails {
            execution_request: Some(crate::api::types::ExecutionRequest {
                negative_test: false,
                variables: HashMap::from([(
                    "FOO".to_string(),
                    Variable {
                        name: "FOO".to_string(),
                        kind: VariableKind::Basic,
                        value: Some("old".to_string()),
                    },
                )]),
            }),
            content: None,
            source: None,
        };
        let args = ExecutionArgs {
            name: None,
            variables: vec!["FOO=new".to_string()],
            secret_variables: vec!["TOKEN=shh".to_string()],
        };
        let merged = merge_variables(&details, &args).unwrap().unwrap();
        assert_eq!(merged["FOO"].value.as_deref(), Some("new"));
        assert_eq!(merged["TOKEN"].kind, VariableKind::Secret);
    }

    #[test]
    fn no_cli_variables_means_no_variables_field() {
        let args = ExecutionArgs {
            name: None,
            variables: vec![],
            secret_variables: vec![],
        };
        let merged = merge_variables(&TargetDetails::default(), &args).unwrap();
        assert!(merged.is_none());
    }
}
