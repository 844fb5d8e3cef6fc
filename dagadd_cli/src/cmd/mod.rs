use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::CliConfig;

mod add;

pub use add::{AddArgs, run_add};

pub async fn run_command(
    config_file: PathBuf,
    local_data_dir: &Path,
    cmd: crate::Commands,
) -> Result<()> {
    match cmd {
        crate::Commands::Config { cmd } => {
            cmd.run(config_file, local_data_dir)?;
            Ok(())
        }
        crate::Commands::Add(args) => {
            let config = CliConfig::load(&config_file)?;
            run_add(args, config, local_data_dir).await
        }
    }
}
