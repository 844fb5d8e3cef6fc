use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use dagadd::{AddContext, AddOptions, AddedEntry, Adder};
use dagadd_core::{AddSource, Content, ImportCandidate, MemoryPins, RepoLock};
use dagadd_importer_flat::FlatImporter;
use dagadd_importer_local::{LocalSourceOptions, local_candidates};
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CliConfig;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Files or directories to add. Reads stdin when none are given.
    pub paths: Vec<PathBuf>,
    /// Chunking algorithm: size-<bytes> or rabin-<min>-<avg>-<max>
    #[arg(long, value_name = "SPEC")]
    pub chunker: Option<String>,
    /// CID version of the produced nodes (0 or 1)
    #[arg(long, value_name = "VERSION")]
    pub cid_version: Option<u8>,
    /// Hash function, e.g. sha2-256, sha2-512 or blake3
    #[arg(long = "hash", value_name = "ALG")]
    pub hash_alg: Option<String>,
    /// Only compute CIDs, write nothing
    #[arg(short = 'n', long)]
    pub only_hash: bool,
    /// Pin the added roots
    #[arg(long, value_name = "BOOL")]
    pub pin: Option<bool>,
    /// Store file data in raw leaves instead of dag-pb nodes
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub raw_leaves: Option<bool>,
    /// Use the trickle DAG layout
    #[arg(long)]
    pub trickle: bool,
    /// Wrap the added entries in a directory
    #[arg(short = 'w', long)]
    pub wrap_with_directory: bool,
    /// Shard large directories
    #[arg(long)]
    pub sharding: bool,
    /// Number of links above which a directory is sharded
    #[arg(long, value_name = "COUNT")]
    pub shard_split_threshold: Option<usize>,
    /// Give up after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    /// Report the number of bytes processed on stderr
    #[arg(long)]
    pub progress: bool,
    /// Include hidden files
    #[arg(long)]
    pub hidden: bool,
    /// Don't respect .gitignore, .ignore and similar files
    #[arg(long)]
    pub no_ignore: bool,
    /// Record file permissions
    #[arg(long)]
    pub preserve_mode: bool,
    /// Record file modification times
    #[arg(long)]
    pub preserve_mtime: bool,
    /// Only print CIDs. Set by the global `-q/--quiet` flag, which also
    /// lowers the log level.
    #[arg(skip)]
    pub quiet: bool,
}

impl AddArgs {
    /// Options set on the command line. Unset ones come from the config file.
    fn add_options(&self) -> AddOptions {
        AddOptions {
            chunker: self.chunker.clone(),
            cid_version: self.cid_version,
            hash_alg: self.hash_alg.clone(),
            only_hash: self.only_hash,
            pin: self.pin,
            raw_leaves: self.raw_leaves,
            shard_split_threshold: self.shard_split_threshold,
            sharding: self.sharding,
            trickle: self.trickle,
            wrap_with_directory: self.wrap_with_directory,
            timeout_ms: self.timeout_ms,
            ..Default::default()
        }
    }

    fn source_options(&self) -> LocalSourceOptions {
        LocalSourceOptions {
            hidden: self.hidden,
            no_ignore: self.no_ignore,
            preserve_mode: self.preserve_mode,
            preserve_mtime: self.preserve_mtime,
        }
    }

    fn source(&self) -> Result<AddSource> {
        if self.paths.is_empty() {
            debug!("reading stdin");
            let stdin = ReaderStream::new(tokio::io::stdin());
            return Ok(ImportCandidate::content(Content::Stream(Box::pin(stdin))).into());
        }
        let mut candidates = Vec::new();
        for path in &self.paths {
            candidates.extend(local_candidates(path, self.source_options())?);
        }
        Ok(candidates.into())
    }
}

pub async fn run_add(args: AddArgs, config: CliConfig, local_data_dir: &Path) -> Result<()> {
    let store = config.open_store(local_data_dir);
    let lock = RepoLock::new();
    // Pins only live as long as this process; the CLI has no pin store yet.
    let pins = MemoryPins::new(Arc::new(lock.clone()));
    let adder = Adder::new(AddContext::new(
        store,
        Arc::new(FlatImporter::new()),
        Arc::new(pins),
        Arc::new(lock),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut options = args.add_options().or(config.add);
    options.cancel = Some(cancel);
    if args.progress && !args.quiet {
        options.progress = Some(Arc::new(|total| eprint!("\rprocessed {total} bytes")));
    }

    let mut entries = adder.add_all(args.source()?, options)?;
    let mut count = 0usize;
    while let Some(entry) = entries.try_next().await? {
        if args.progress && !args.quiet {
            eprintln!();
        }
        println!("{}", entry_line(&entry, args.quiet));
        count += 1;
    }
    info!("added {count} entries");
    Ok(())
}

fn entry_line(entry: &AddedEntry, quiet: bool) -> String {
    if quiet {
        entry.cid.to_string()
    } else if entry.path.is_empty() {
        format!("added {}", entry.cid)
    } else {
        format!("added {} {}", entry.cid, entry.path)
    }
}
