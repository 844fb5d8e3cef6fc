//! Stream stages layered on top of the importer output.
//!
//! Each stage wraps the one before it and is only polled when its own
//! consumer polls, so the chain stays lazy end to end.

pub mod entry;
pub mod pin;
pub mod preload;

pub use entry::{AddedEntry, EntryTransform};
pub use pin::PinStage;
pub use preload::PreloadStage;

/// Whether an entry is a root for preloading.
///
/// With wrapping, only the wrapper itself (empty path) qualifies.
pub fn is_preload_root(path: &str, wrap_with_directory: bool) -> bool {
    if path.is_empty() || wrap_with_directory {
        path.is_empty()
    } else {
        !path.contains('/')
    }
}

/// Whether an entry is a root for pinning.
///
/// Ignores wrapping: the direct children of a wrapper are pinned as well.
pub fn is_pin_root(path: &str) -> bool {
    !path.contains('/')
}
