//! Console Commands
//!
//! Line commands for the interactive shell and their JSON replies.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::auth::{RefreshOutcome, SessionState};
use crate::customers::{ListQuery, ResourceRequestError};
use crate::routes::History;
use crate::Console;

/// One shell line
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Debug, Subcommand)]
pub enum ShellCommand {
    /// Sign in and open the customer list
    Login {
        email: String,
        password: String,
        /// Keep the session for 30 days
        #[arg(long)]
        remember: bool,
    },
    /// Rotate the access token
    Refresh,
    /// Sign out
    Logout,
    /// Show session state
    Status,
    /// Navigate to a route
    Go { path: String },
    /// List customers
    List {
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        size: Option<u64>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one customer
    Get { id: String },
    /// Create a customer from a JSON body
    Create { json: String },
    /// Replace a customer with a JSON body
    Update { id: String, json: String },
    /// Delete a customer
    Delete { id: String },
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

// Replies

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: SessionState,
    pub remember: bool,
    pub route: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub success: bool,
    pub route: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResult {
    pub outcome: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResult {
    pub requested: String,
    pub route: String,
}

/// Parse a shell line, honouring single and double quotes
pub fn parse_line(line: &str) -> Result<ShellCommand, clap::Error> {
    Line::try_parse_from(split_args(line)).map(|l| l.command)
}

fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_arg = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if in_arg {
        args.push(current);
    }
    args
}

/// Run one command against the console
pub async fn execute(
    console: &Console,
    history: &History,
    command: ShellCommand,
) -> Result<Value, CommandError> {
    debug!("Executing {}", command_name(&command));

    let reply = match command {
        ShellCommand::Login {
            email,
            password,
            remember,
        } => match console.session.login(&email, &password, remember).await {
            Ok(()) => to_value(LoginResult {
                success: true,
                route: history.current(),
                error: None,
            })?,
            Err(e) => {
                error!("Login failed: {}", e);
                to_value(LoginResult {
                    success: false,
                    route: history.current(),
                    error: Some(e.to_string()),
                })?
            }
        },
        ShellCommand::Refresh => {
            let result = match console.session.refresh().await {
                RefreshOutcome::Skipped => RefreshResult {
                    outcome: "skipped",
                    error: None,
                },
                RefreshOutcome::Refreshed => RefreshResult {
                    outcome: "refreshed",
                    error: None,
                },
                RefreshOutcome::Terminated(e) => RefreshResult {
                    outcome: "terminated",
                    error: Some(e.to_string()),
                },
            };
            to_value(result)?
        }
        ShellCommand::Logout => {
            console.session.logout();
            status(console, history)?
        }
        ShellCommand::Status => status(console, history)?,
        ShellCommand::Go { path } => {
            let route = console.router.navigate(&path);
            to_value(NavigationResult {
                requested: path,
                route,
            })?
        }
        ShellCommand::List {
            page,
            size,
            sort,
            desc,
            search,
        } => {
            let page = console
                .customers
                .list(ListQuery {
                    page_number: page,
                    page_size: size,
                    sort_by: sort,
                    sort_descending: Some(desc),
                    search_term: search,
                })
                .await?;
            info!(
                "Listed {} customers (page {} of {})",
                page.customers.len(),
                page.pagination.page_number,
                page.pagination.total_pages
            );
            to_value(page)?
        }
        ShellCommand::Get { id } => to_value(console.customers.get(&id).await?)?,
        ShellCommand::Create { json } => {
            let body = parse_body(&json)?;
            to_value(console.customers.create(&body).await?)?
        }
        ShellCommand::Update { id, json } => {
            let body = parse_body(&json)?;
            to_value(console.customers.update(&id, &body).await?)?
        }
        ShellCommand::Delete { id } => to_value(console.customers.delete(&id).await?)?,
        ShellCommand::Quit => Value::Null,
    };

    Ok(reply)
}

fn status(console: &Console, history: &History) -> Result<Value, CommandError> {
    to_value(SessionResponse {
        state: console.session.state(),
        remember: console.session.remember(),
        route: history.current(),
    })
}

fn command_name(command: &ShellCommand) -> &'static str {
    match command {
        ShellCommand::Login { .. } => "login",
        ShellCommand::Refresh => "refresh",
        ShellCommand::Logout => "logout",
        ShellCommand::Status => "status",
        ShellCommand::Go { .. } => "go",
        ShellCommand::List { .. } => "list",
        ShellCommand::Get { .. } => "get",
        ShellCommand::Create { .. } => "create",
        ShellCommand::Update { .. } => "update",
        ShellCommand::Delete { .. } => "delete",
        ShellCommand::Quit => "quit",
    }
}

fn parse_body(json: &str) -> Result<Value, CommandError> {
    serde_json::from_str(json).map_err(|e| CommandError::InvalidBody(e.to_string()))
}

fn to_value<T: Serialize>(reply: T) -> Result<Value, CommandError> {
    serde_json::to_value(reply).map_err(|e| CommandError::Serialization(e.to_string()))
}

/// Command errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Resource(#[from] ResourceRequestError),

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_arguments_stay_together() {
        assert_eq!(
            split_args(r#"create '{"deviceName": "Pump 2"}'"#),
            vec!["create", r#"{"deviceName": "Pump 2"}"#]
        );
        assert_eq!(split_args("  login a@b.com pw  "), vec!["login", "a@b.com", "pw"]);
        assert_eq!(split_args(r#"list --search """#), vec!["list", "--search", ""]);
    }

    #[test]
    fn login_line_parses_remember_flag() {
        match parse_line("login a@b.com pw --remember").unwrap() {
            ShellCommand::Login {
                email,
                password,
                remember,
            } => {
                assert_eq!(email, "a@b.com");
                assert_eq!(password, "pw");
                assert!(remember);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn exit_is_an_alias_for_quit() {
        assert!(matches!(parse_line("exit").unwrap(), ShellCommand::Quit));
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse_line("reboot").is_err());
    }
}
