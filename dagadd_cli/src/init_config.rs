use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Subcommand;
use toml_edit::{DocumentMut, Item, Table};
use tracing::info;

#[derive(Subcommand)]
pub enum CmdConfig {
    /// Creates the config file if it doesn't exist and fills in missing defaults
    Init,
}

impl CmdConfig {
    pub fn run(self, config_file: PathBuf, local_data_dir: &Path) -> anyhow::Result<()> {
        let mut doc = if config_file.exists() {
            fs::read_to_string(&config_file)?
        } else {
            if let Some(parent) = config_file.parent() {
                fs::create_dir_all(parent)?;
            }
            "".to_owned()
        }
        .parse::<DocumentMut>()
        .context("could not parse config file")?;

        match self {
            Self::Init => {
                let store_path = local_data_dir.join("store");
                let store = doc
                    .entry("store")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`store` in config file is not a table")?;
                // An existing store keeps whatever it points at.
                if !store.contains_key("type") {
                    store.insert("type", "local".into());
                    store.insert("base_path", store_path.to_string_lossy().into_owned().into());
                }

                let add = doc
                    .entry("add")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`add` in config file is not a table")?;
                add.entry("chunker").or_insert("size-262144".into());
                add.entry("cid_version").or_insert(0i64.into());
                add.entry("pin").or_insert(true.into());
            }
        }

        info!("writing to config file {config_file:?}");

        let tmp_path = config_file.with_extension("tmp");
        let mut tmp = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(doc.to_string().as_bytes())?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, config_file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliConfig, StoreConfig};

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("dagadd").join("config.toml");
        let data_dir = dir.path().join("data");

        CmdConfig::Init.run(config_file.clone(), &data_dir).unwrap();

        let config = CliConfig::load(&config_file).unwrap();
        match config.store {
            Some(StoreConfig::Local(store)) => {
                assert_eq!(store.base_path, data_dir.join("store").to_string_lossy())
            }
            other => panic!("unexpected store {other:?}"),
        }
        assert_eq!(config.add.chunker.as_deref(), Some("size-262144"));
        assert_eq!(config.add.cid_version, Some(0));
        assert_eq!(config.add.pin, Some(true));
        assert!(!config_file.with_extension("tmp").exists());
    }

    #[test]
    fn test_init_keeps_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("config.toml");
        fs::write(
            &config_file,
            "# my settings\n[store]\ntype = \"memory\"\n\n[add]\ncid_version = 1\n",
        )
        .unwrap();

        CmdConfig::Init.run(config_file.clone(), dir.path()).unwrap();

        let written = fs::read_to_string(&config_file).unwrap();
        assert!(written.contains("# my settings"));
        let config = CliConfig::load(&config_file).unwrap();
        assert_eq!(config.store, Some(StoreConfig::Memory));
        assert_eq!(config.add.cid_version, Some(1));
        assert_eq!(config.add.pin, Some(true));
    }
}
