//! # playpen CLI
//!
//! Command-line interface and dev server for the playpen live preview sandbox.

mod commands;
mod protocol;
mod session;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "playpen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "playpen.yml", env = "PLAYPEN_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config and component
    Init {
        /// Target directory (defaults to current directory)
        path: Option<PathBuf>,
    },

    /// Start the editor and live preview server
    Serve {
        /// Interface to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,

        /// Mirror this file into the editor, reloading on change
        #[arg(long)]
        file: Option<PathBuf>,

        /// Open the page in a browser
        #[arg(long)]
        open: bool,
    },

    /// Synthesize the preview document for a source file
    Render {
        /// Source file (defaults to the starter component)
        input: Option<PathBuf>,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show discovered imports and the resulting resolution map
    Imports {
        /// Source file (defaults to the starter component)
        input: Option<PathBuf>,

        /// Return JSON for machine consumption
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries command output, so logs go to stderr.
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => commands::init_project(path.as_deref()),
        Commands::Serve {
            host,
            port,
            file,
            open,
        } => {
            let opts = commands::ServeOptions {
                host,
                port,
                file,
                open,
            };
            commands::serve(&cli.config, opts).await
        }
        Commands::Render { input, output } => {
            commands::render_document(&cli.config, input.as_deref(), output.as_deref())
        }
        Commands::Imports { input, json } => {
            commands::show_imports(&cli.config, input.as_deref(), json)
        }
    }
}
