//! home-cli: command-line host for the home engine.
//!
//! Works against the same settings file a desktop host would use.
//!
//! ## Subcommands
//!
//! - `resolve`: Resolve the configured home against a vault directory
//! - `set-home`: Make a resource path the home
//! - `show-config`: Print the effective settings
//! - `simulate`: Run one trigger against a layout described in JSON

mod commands;
mod error;
mod logging;

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

use commands::Trigger;
use error::Result;
use home_core::{FormFactor, SettingsPaths};

#[derive(Parser)]
#[command(name = "home-cli")]
#[command(about = "Resolve, configure and simulate the home view")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the configured home against a vault
    Resolve {
        /// Vault root directory
        #[arg(long, value_name = "DIR")]
        vault: PathBuf,

        /// Use the mobile descriptor when one is configured
        #[arg(long)]
        mobile: bool,
    },

    /// Make a resource the home
    SetHome {
        /// Vault-relative resource path
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Print the effective settings as JSON
    ShowConfig,

    /// Run the engine against an in-memory layout
    Simulate {
        /// JSON file with `resources` and `tabs`
        #[arg(long, value_name = "FILE")]
        layout: PathBuf,

        #[arg(long, value_enum, default_value_t = Trigger::Startup)]
        trigger: Trigger,
    },
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.log_dir.as_deref());

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "home-cli failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings_path = match cli.settings {
        Some(path) => path,
        None => SettingsPaths::from_system()?.settings_file(),
    };
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Resolve { vault, mobile } => {
            let form_factor = if mobile {
                FormFactor::Mobile
            } else {
                FormFactor::Desktop
            };
            commands::resolve(&settings_path, &vault, form_factor, &mut out)
        }
        Commands::SetHome { path } => commands::set_home(&settings_path, &path, &mut out),
        Commands::ShowConfig => commands::show_config(&settings_path, &mut out),
        Commands::Simulate { layout, trigger } => {
            commands::simulate(&settings_path, &layout, trigger, &mut out)
        }
    }
}
