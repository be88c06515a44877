mod cli;
mod config;
mod error;
mod extract;
mod merge;
mod mirror;
mod model;
mod pipeline;
mod providers;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::MergeModeName;

#[derive(Parser)]
#[command(version, about = "Collect tracker issues and merge them with spreadsheet exports")]
struct Args {
    /// Config file (default: ~/.harvest/config.toml)
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Quiet mode - warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch issues of every configured project into the store
    Collect {
        /// Project to collect (repeatable, overrides config)
        #[arg(short, long = "project")]
        projects: Vec<String>,

        /// Store file to append to
        #[arg(long)]
        store: Option<PathBuf>,

        /// Replace rows with the same project and key instead of appending
        #[arg(long)]
        upsert: bool,

        /// Read only the first page of each project
        #[arg(long)]
        single_page: bool,
    },

    /// Merge the store with sibling exports into one table
    Merge {
        /// Output shape
        #[arg(short, long, value_enum)]
        mode: Option<MergeModeName>,

        /// Input as PATH[=LABEL[:MAPPING]] (repeatable, overrides config)
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Merged output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Shared column kept in narrow mode
        #[arg(long)]
        column: Option<String>,
    },

    /// Copy the remote configuration directory once
    Mirror,

    /// Mirror, then collect
    Run,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let default_filter = if args.quiet { "harvest=warn" } else { "harvest=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let config_path = args.config.unwrap_or_else(config::config_path);
    let config = config::load_config(&config_path)?;

    match args.command {
        Command::Collect {
            projects,
            store,
            upsert,
            single_page,
        } => {
            cli::handle_collect(
                &config,
                cli::CollectArgs {
                    projects,
                    store,
                    upsert,
                    single_page,
                },
            )
            .await
        }
        Command::Merge {
            mode,
            inputs,
            output,
            column,
        } => cli::handle_merge(
            &config,
            cli::MergeArgs {
                mode,
                inputs,
                output,
                column,
            },
        ),
        Command::Mirror => cli::handle_mirror(&config),
        Command::Run => cli::handle_run(&config).await,
    }
}
