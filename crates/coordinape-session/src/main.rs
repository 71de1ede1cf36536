/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Wallet login, session status, logout and signed API calls
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use console::style;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coordinape_session::{SessionRunner, SessionSettings};

#[derive(Parser, Debug)]
#[command(name = "coordinape-session", version, about = "Coordinape wallet session runner")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Validate configuration and exit
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a configuration file interactively
    Init {
        #[arg(long, default_value = "coordinape.yaml")]
        output: PathBuf,
    },
    /// Connect the wallet, reuse or obtain a token, print the manifest
    Login,
    /// Show cached addresses and the remembered connector
    Status,
    /// Forget the active address's token and disconnect
    Logout,
    /// Authenticated API call; a body makes it a signed mutation
    Call {
        method: String,
        path: String,
        /// JSON body
        #[arg(long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    if let Some(Command::Init { output }) = &args.command {
        return cli::init::run_init(output.clone());
    }

    let settings = load_config(args.config_path.as_deref())?;
    info!(api_url = %settings.api_url, "configuration loaded");

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let Some(command) = args.command else {
        return Err(anyhow!("no command given; see --help"));
    };

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let private_key = settings.private_key()?;
    let runner = SessionRunner::start(&settings, &private_key, shutdown.clone())
        .await
        .context("start session")?;

    let outcome = run_command(&runner, command).await;
    runner.shutdown().await;
    info!("session shutdown complete");
    outcome
}

async fn run_command(runner: &SessionRunner, command: Command) -> Result<()> {
    match command {
        Command::Init { .. } => Ok(()),
        Command::Login => {
            let manifest = runner.login().await?;
            let address = runner
                .session()
                .active_address()
                .await
                .unwrap_or_default();
            println!("{} {}", style("Authenticated").bold().green(), style(&address).cyan());
            println!(
                "circles: {}  memberships: {}  active epochs: {}",
                manifest.circles.len(),
                manifest.my_users.len(),
                manifest.active_epochs.len()
            );
            Ok(())
        }
        Command::Status => {
            let report = runner.status().await;
            let connector = report
                .remembered_connector
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "none".to_string());
            println!("{} {}", style("Remembered connector:").bold(), connector);
            if report.cached_addresses.is_empty() {
                println!("{}", style("No cached tokens").dim());
            }
            for address in report.cached_addresses {
                println!("  {}", style(address).cyan());
            }
            Ok(())
        }
        Command::Logout => {
            match runner.logout().await? {
                Some(address) => println!("{} {}", style("Logged out").bold(), style(address).cyan()),
                None => println!("{}", style("Nothing to log out").dim()),
            }
            Ok(())
        }
        Command::Call { method, path, body } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method {method}"))?;
            let body = body
                .map(|body| serde_json::from_str(&body))
                .transpose()
                .context("body must be valid JSON")?;
            let response = runner.call(method, &path, body).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SessionSettings> {
    match path {
        Some(path) => SessionSettings::from_file(path).context("load config"),
        None => {
            info!("no --config given; using defaults");
            Ok(SessionSettings::default())
        }
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
