use anyhow::{Context, anyhow};
use dagadd_core::{AddSource, Content, ImportCandidate, Mtime};
use futures::{StreamExt, TryStreamExt};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio_util::io::ReaderStream;

/// What to pick up while walking the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSourceOptions {
    /// Include hidden files and directories.
    pub hidden: bool,
    /// Ignore `.gitignore`, `.ignore` and similar files.
    pub no_ignore: bool,
    /// Record Unix permission bits.
    pub preserve_mode: bool,
    /// Record modification times.
    pub preserve_mtime: bool,
}

/// Builds an add source from a local file or directory.
///
/// Paths are relative to the parent of `path`, so adding `/data/photos`
/// yields `photos`, `photos/a.jpg` and so on. Files are opened lazily, when
/// the importer starts reading them. Symlinks and special files are skipped.
pub fn local_source(
    path: impl AsRef<Path>,
    options: LocalSourceOptions,
) -> anyhow::Result<AddSource> {
    local_candidates(path, options).map(AddSource::Candidates)
}

/// The candidates [`local_source`] is made of, for callers that combine
/// several paths into one add.
pub fn local_candidates(
    path: impl AsRef<Path>,
    options: LocalSourceOptions,
) -> anyhow::Result<Vec<ImportCandidate>> {
    let path = path.as_ref();
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {:?}", path))?;
    let base = path.parent().unwrap_or(&path).to_path_buf();

    log::info!("Walking {:?}", path);

    let walker = ignore::WalkBuilder::new(&path)
        .standard_filters(!options.no_ignore)
        .hidden(!options.hidden)
        .require_git(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = entry?;
        let entry_path = entry.path();
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() && !file_type.is_dir() {
            log::warn!("Skipping {:?}: not a regular file or directory", entry_path);
            continue;
        }

        let name = relative_path(&base, entry_path)?;
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to get metadata for {:?}", entry_path))?;

        let mut candidate = if file_type.is_dir() {
            log::debug!("Adding directory {}", name);
            ImportCandidate::dir(name)
        } else {
            log::debug!("Adding file {}", name);
            ImportCandidate::file(name, lazy_file(entry_path.to_path_buf()))
        };
        if options.preserve_mode {
            candidate.mode = file_mode(&metadata);
        }
        if options.preserve_mtime {
            candidate.mtime = file_mtime(&metadata);
        }
        candidates.push(candidate);
    }

    log::info!("Found {} entries under {:?}", candidates.len(), path);
    Ok(candidates)
}

/// `/`-separated path of `path` below `base`.
fn relative_path(base: &Path, path: &Path) -> anyhow::Result<String> {
    let relative = path
        .strip_prefix(base)
        .with_context(|| format!("{:?} is not below {:?}", path, base))?;
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| anyhow!("Path is not valid UTF-8: {:?}", path))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

/// File content that is only opened once it is polled.
fn lazy_file(path: PathBuf) -> Content {
    let stream = futures::stream::once(tokio::fs::File::open(path))
        .map_ok(ReaderStream::new)
        .try_flatten();
    Content::Stream(stream.boxed())
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_metadata: &Metadata) -> Option<u32> {
    None
}

fn file_mtime(metadata: &Metadata) -> Option<Mtime> {
    let modified = metadata.modified().ok()?;
    match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => Some(Mtime::new(after.as_secs() as i64, after.subsec_nanos())),
        Err(err) => {
            let before = err.duration();
            let (secs, nanos) = (before.as_secs() as i64, before.subsec_nanos());
            if nanos == 0 {
                Some(Mtime::new(-secs, 0))
            } else {
                Some(Mtime::new(-secs - 1, 1_000_000_000 - nanos))
            }
        }
    }
}
