use crate::cmd::AddArgs;
use crate::init_config::CmdConfig;
use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

mod cmd;
mod config;
mod init_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// config file to use instead of ~/.config/dagadd/config.toml
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modify the dagadd config
    Config {
        #[command(subcommand)]
        cmd: CmdConfig,
    },
    /// Add files, directories or stdin to the block store
    Add(AddArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    if let Commands::Add(args) = &mut cli.cmd {
        args.quiet = cli.verbosity.tracing_level_filter() < LevelFilter::INFO;
    }
    // Logs go to stderr so stdout only carries added CIDs.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    // - Config under: ~/.config/dagadd/config.toml
    // - Blocks under: ~/.local/share/dagadd/store/
    let dirs =
        ProjectDirs::from("", "", "dagadd").context("failed to determine config directory path")?;

    let config_file = cli
        .config
        .unwrap_or_else(|| dirs.config_dir().join("config.toml"));
    let local_data_dir = dirs.data_dir();

    cmd::run_command(config_file, local_data_dir, cli.cmd).await
}
