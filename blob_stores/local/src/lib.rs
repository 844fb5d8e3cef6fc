use anyhow::{Context, anyhow};
use bytes::Bytes;
use dagadd_core::content_id::RAW;
use dagadd_core::{Blockstore, Cid, StoreError, StoreResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use walkdir::WalkDir;

const BLOCKS_DIR: &str = "blocks";
const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalStoreConfig {
    pub base_path: String,
}

/// Block store that keeps one file per block.
///
/// Blocks live under `<base>/blocks/<shard>/<key>`, where `key` is the
/// base32 CIDv1 of the block's multihash under the raw codec and `shard` is
/// made of the two characters before its last one. Keying by multihash
/// makes lookups independent of CID version and codec; [`Blockstore::list`]
/// therefore reports every block as a raw CIDv1.
#[derive(Debug)]
pub struct LocalBlockstore {
    base_path: PathBuf,
    tmp_counter: AtomicU64,
}

impl LocalBlockstore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalBlockstore {
            base_path: base_path.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn create(config: LocalStoreConfig) -> Self {
        Self::new(config.base_path)
    }

    fn key(cid: &Cid) -> String {
        Cid::new_v1(RAW, *cid.hash()).to_string()
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        let key = Self::key(cid);
        let end = key.len() - 1;
        let shard = &key[end - 2..end];
        self.base_path.join(BLOCKS_DIR).join(shard).join(key)
    }
}

#[async_trait::async_trait]
impl Blockstore for LocalBlockstore {
    /// Writes the block to a temporary file and renames it into place.
    async fn put(&self, cid: &Cid, block: Bytes) -> StoreResult<()> {
        let path = self.block_path(cid);
        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("block path has no parent: {}", path.display()))?;
        tokio::fs::create_dir_all(parent).await?;

        let tmp = path.with_extension(format!(
            "{}.{}{TMP_SUFFIX}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, &block)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        tracing::trace!(%cid, path = %path.display(), "local store: wrote block");
        Ok(())
    }

    async fn get(&self, cid: &Cid) -> StoreResult<Bytes> {
        match tokio::fs::read(self.block_path(cid)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(*cid).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        tokio::fs::try_exists(self.block_path(cid))
            .await
            .map_err(Into::into)
    }

    async fn delete(&self, cid: &Cid) -> StoreResult<()> {
        match tokio::fs::remove_file(self.block_path(cid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StoreResult<Vec<Cid>> {
        let root = self.base_path.join(BLOCKS_DIR);
        tokio::task::spawn_blocking(move || -> StoreResult<Vec<Cid>> {
            let mut cids = Vec::new();
            if !root.exists() {
                return Ok(cids);
            }
            for entry in WalkDir::new(&root) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if name.ends_with(TMP_SUFFIX) {
                    continue;
                }
                match Cid::try_from(name.as_ref()) {
                    Ok(cid) => cids.push(cid),
                    Err(err) => {
                        tracing::warn!(path = %entry.path().display(), "local store: skipping foreign file: {err}")
                    }
                }
            }
            Ok(cids)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagadd_core::testutil::{BlockstoreTests, pb_cid, raw_cid};

    #[tokio::test]
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalBlockstore::new(temp_dir.path());
        BlockstoreTests::new(&store).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalBlockstore::create(LocalStoreConfig {
            base_path: temp_dir.path().to_string_lossy().into_owned(),
        });

        let cid = pb_cid(b"layout");
        store.put(&cid, Bytes::from_static(b"layout")).await.unwrap();

        let key = Cid::new_v1(RAW, *cid.hash()).to_string();
        let shard = &key[key.len() - 3..key.len() - 1];
        let path = temp_dir.path().join("blocks").join(shard).join(&key);
        assert_eq!(std::fs::read(path).unwrap(), b"layout");
    }

    #[tokio::test]
    async fn test_list_skips_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalBlockstore::new(temp_dir.path());
        let cid = raw_cid(b"kept");
        store.put(&cid, Bytes::from_static(b"kept")).await.unwrap();

        let shard_dir = store.block_path(&cid).parent().unwrap().to_path_buf();
        std::fs::write(shard_dir.join("leftover.1.tmp"), b"partial").unwrap();

        assert_eq!(store.list().await.unwrap(), vec![cid]);
    }
}
