//! scriptlet-ctl
//!
//! Renders and checks tag templates on disk.

mod cli_config;
mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "scriptlet-ctl", version, about, styles = output::clap_styles())]
struct Cli {
    /// Engine config file (default: ./.scriptlet.toml, then ~/.config/scriptlet.toml)
    #[arg(long, global = true, env = "SCRIPTLET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a template file
    Render {
        /// Template file
        template: PathBuf,

        /// JSON file with render data (default: {})
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile template files and report errors
    Check {
        /// Template files
        #[arg(required = true)]
        templates: Vec<PathBuf>,

        /// Print the generated instruction listing of each template
        #[arg(long)]
        listing: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scriptlet=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            output::error(format!("{e:#}"));
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = cli_config::load_engine_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Render {
            template,
            data,
            output,
        } => {
            commands::handle_render_command(config, &template, data.as_deref(), output.as_deref())
                .await?;
            Ok(true)
        }
        Commands::Check { templates, listing } => {
            commands::handle_check_command(config, &templates, listing)
        }
    }
}
