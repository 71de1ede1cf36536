/*
[INPUT]:  Interactive user input via CLI
[OUTPUT]: Generated YAML session configuration file
[POS]:    CLI initialization layer
[UPDATE]: When SessionSettings schema changes
*/

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use coordinape_adapter::{ConnectorKind, ErrorPurge};
use dialoguer::{Input, Select, theme::ColorfulTheme};

use coordinape_session::config::{SessionSettings, WalletSettings};

pub fn run_init(output: PathBuf) -> Result<()> {
    println!("{}", style("Welcome to Coordinape session init").bold().cyan());
    println!(
        "{}",
        style("This will guide you through creating a new session configuration.").dim()
    );

    let theme = ColorfulTheme::default();
    let defaults = SessionSettings::default();

    let api_url: String = Input::with_theme(&theme)
        .with_prompt("API URL")
        .default(defaults.api_url.clone())
        .interact_text()?;

    println!("\n{}", style("--- Wallet ---").bold());
    let private_key_env: String = Input::with_theme(&theme)
        .with_prompt("Environment variable holding the private key")
        .default(defaults.wallet.private_key_env.clone())
        .interact_text()?;

    let connector_names: Vec<&str> = ConnectorKind::ALL.iter().map(|kind| kind.as_str()).collect();
    let connector = Select::with_theme(&theme)
        .with_prompt("Register the key as connector")
        .items(&connector_names)
        .default(0)
        .interact()?;

    println!("\n{}", style("--- Session ---").bold());
    let activation_timeout_secs: u64 = Input::with_theme(&theme)
        .with_prompt("Wallet activation timeout (seconds)")
        .default(defaults.activation_timeout_secs)
        .interact_text()?;

    let purge_choices = [ErrorPurge::Active, ErrorPurge::None, ErrorPurge::All];
    let purge_labels = [
        "active - drop the active address's token",
        "none - keep every token",
        "all - drop every cached token",
    ];
    let purge = Select::with_theme(&theme)
        .with_prompt("On wallet errors")
        .items(&purge_labels)
        .default(0)
        .interact()?;

    let settings = SessionSettings {
        api_url,
        activation_timeout_secs,
        error_purge: purge_choices[purge],
        wallet: WalletSettings {
            private_key_env,
            connector: ConnectorKind::ALL[connector],
        },
        ..defaults
    };
    settings.validate()?;

    let yaml = serde_yaml::to_string(&settings).context("failed to serialize config to YAML")?;

    std::fs::write(&output, yaml)
        .with_context(|| format!("failed to write config to {}", output.display()))?;

    println!("\n{}", style("SUCCESS!").bold().green());
    println!("Configuration written to: {}", style(output.display()).cyan());

    Ok(())
}
