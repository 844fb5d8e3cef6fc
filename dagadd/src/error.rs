use cid::Cid;
use std::time::Duration;

/// Errors surfaced by an add.
///
/// Option errors are returned by `Adder::add_all` itself, before any lock
/// is taken. Everything else is yielded by the add stream, which then ends.
#[derive(thiserror::Error, Debug)]
pub enum AddError {
    #[error("invalid chunker spec {spec:?}: {reason}")]
    InvalidChunkerSpec { spec: String, reason: String },
    #[error("invalid cid version {0}: expected 0 or 1")]
    InvalidCidVersion(u8),
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlg(String),
    /// Raised by the normalizer, the importer or the block store.
    #[error(transparent)]
    Import(anyhow::Error),
    #[error("failed to pin {cid}")]
    Pin {
        cid: Cid,
        #[source]
        source: anyhow::Error,
    },
    #[error("add timed out after {0:?}")]
    Timeout(Duration),
    #[error("add aborted")]
    Aborted,
    #[error("source produced no entries")]
    NothingAdded,
}

impl AddError {
    pub(crate) fn chunker(spec: &str, reason: impl Into<String>) -> Self {
        AddError::InvalidChunkerSpec {
            spec: spec.to_owned(),
            reason: reason.into(),
        }
    }
}
