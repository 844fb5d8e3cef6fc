use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use dagadd::AddOptions;
use dagadd_core::Blockstore;
use dagadd_store_local::{LocalBlockstore, LocalStoreConfig};
use dagadd_store_memory::MemoryBlockstore;
use serde::Deserialize;

/// Contents of the CLI config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub store: Option<StoreConfig>,
    /// Defaults for `dagadd add`; flags win over these.
    pub add: AddOptions,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Local(LocalStoreConfig),
    /// Blocks are dropped when the process exits.
    Memory,
}

impl CliConfig {
    /// Reads `path`, falling back to the defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "config file missing, using defaults");
            return Ok(Self::default());
        }
        let toml_content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {path:?}"))?;
        toml::from_str(&toml_content).with_context(|| format!("could not parse config file {path:?}"))
    }

    /// Opens the configured block store, or a local one under
    /// `local_data_dir` when none is configured.
    pub fn open_store(&self, local_data_dir: &Path) -> Arc<dyn Blockstore> {
        match &self.store {
            Some(StoreConfig::Local(config)) => Arc::new(LocalBlockstore::create(config.clone())),
            Some(StoreConfig::Memory) => Arc::new(MemoryBlockstore::new()),
            None => Arc::new(LocalBlockstore::new(local_data_dir.join("store"))),
        }
    }
}
