//! bundlepush CLI
//!
//! Installs RAUC bundles on a device by letting the device pull them from
//! this machine through a reverse SSH tunnel.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bp_core::config::PASSWORD_ENV;
use bundlepush::commands::{self, InstallArgs};
use bundlepush::output::print_error;

#[derive(Parser)]
#[command(name = "bundlepush")]
#[command(author, version, about = "Install RAUC bundles through a reverse SSH tunnel")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install one or more bundles on a device, in order
    Install {
        /// Device address (host, host:port, or [v6]:port)
        target: String,
        /// Bundle files to install
        #[arg(required = true)]
        bundles: Vec<PathBuf>,
        /// SSH user (overrides config, default root)
        #[arg(short = 'l', long)]
        user: Option<String>,
        /// SSH password (overrides config, default root)
        #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
        pass: Option<String>,
        /// Reboot the device after every bundle installed
        #[arg(short, long)]
        reboot: bool,
        /// Refuse to serve files other than the given bundles
        #[arg(long)]
        only_bundles: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show the config file path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = log_level(cli.quiet, cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Default filter; `-q` keeps only errors, so informational lines vanish
fn log_level(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Install {
            target,
            bundles,
            user,
            pass,
            reboot,
            only_bundles,
        } => {
            let args = InstallArgs {
                target,
                bundles,
                user,
                pass,
                reboot,
                only_bundles,
                quiet: cli.quiet,
            };
            commands::install_command(config_path, args).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path)?,
            ConfigAction::Path => commands::config_path(config_path)?,
        },
    }

    Ok(())
}
