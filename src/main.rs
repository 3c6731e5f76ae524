//! Device Console - Main Entry Point
//!
//! Interactive shell over the console session. Each stdin line is one
//! command; replies are printed as JSON. The process is the browsing
//! session: session-scoped tokens do not outlive it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use device_console_lib::{
    backend::BackendKind,
    commands::{self, ShellCommand},
    config::{Config, ConfigError},
    logging,
    routes::History,
    storage::FileStorage,
    Console,
};

/// Flags override the `CONSOLE_*` environment, which overrides the defaults
#[derive(Debug, Parser)]
#[command(name = "device-console", version, about = "Device console session client")]
struct Cli {
    /// Backend base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Authentication contract: `token` or `local`
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Directory for persisted tokens and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn apply(self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(url) = self.api_url {
            config.api_base_url = url;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.apply(Config::from_env()?)?;

    logging::init(&config.data_dir);
    info!("Device console starting ({} backend)", config.backend);

    let storage = Arc::new(FileStorage::with_path(config.data_dir.clone()));
    let history = Arc::new(History::new());
    let console = Console::new(&config, storage, history.clone())
        .context("failed to create HTTP client")?;

    // The initial page load goes through the guard like any navigation
    console.router.navigate("/");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match commands::parse_line(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        if matches!(command, ShellCommand::Quit) {
            break;
        }

        match commands::execute(&console, &history, command).await {
            Ok(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
            Err(e) => {
                warn!("Command failed: {}", e);
                eprintln!("error: {}", e);
            }
        }
    }

    info!("Device console exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_base_config() {
        let base = Config {
            api_base_url: "http://env.example.com".into(),
            ..Config::default()
        };
        let cli = Cli::try_parse_from([
            "device-console",
            "--backend",
            "local",
            "--timeout",
            "5",
        ])
        .unwrap();

        let config = cli.apply(base).unwrap();
        assert_eq!(config.api_base_url, "http://env.example.com");
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_flag_url_is_rejected() {
        let cli = Cli::try_parse_from(["device-console", "--api-url", "localhost"]).unwrap();
        assert!(matches!(cli.apply(Config::default()), Err(ConfigError::ApiUrl(_))));
    }
}
