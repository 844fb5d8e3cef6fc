//! Source shapes accepted by an add and their normalization.

use crate::import::{CandidateStream, ImportCandidate};
use bytes::Bytes;
use futures::StreamExt;
use std::fmt;

/// Anything that can be added.
pub enum AddSource {
    /// A single unnamed file.
    Bytes(Bytes),
    /// A single file or directory object.
    Candidate(ImportCandidate),
    /// A set of file and directory objects, e.g. a directory tree.
    Candidates(Vec<ImportCandidate>),
    /// A lazily produced set of file and directory objects.
    Stream(CandidateStream),
}

impl fmt::Debug for AddSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            AddSource::Candidate(c) => f.debug_tuple("Candidate").field(c).finish(),
            AddSource::Candidates(c) => f.debug_tuple("Candidates").field(&c.len()).finish(),
            AddSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for AddSource {
    fn from(bytes: Bytes) -> Self {
        AddSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for AddSource {
    fn from(bytes: Vec<u8>) -> Self {
        AddSource::Bytes(bytes.into())
    }
}

impl From<ImportCandidate> for AddSource {
    fn from(candidate: ImportCandidate) -> Self {
        AddSource::Candidate(candidate)
    }
}

impl From<Vec<ImportCandidate>> for AddSource {
    fn from(candidates: Vec<ImportCandidate>) -> Self {
        AddSource::Candidates(candidates)
    }
}

impl From<CandidateStream> for AddSource {
    fn from(stream: CandidateStream) -> Self {
        AddSource::Stream(stream)
    }
}

/// Turns a source into the canonical candidate stream.
pub trait Normalizer: fmt::Debug + Send + Sync {
    fn normalize(&self, source: AddSource) -> CandidateStream;
}

/// Flattens every [`AddSource`] shape into a stream and cleans up paths.
///
/// Paths lose leading `/` and `./`, repeated separators and trailing
/// separators. A path that becomes empty is treated as absent. Paths with
/// `..` components are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl Normalizer for DefaultNormalizer {
    fn normalize(&self, source: AddSource) -> CandidateStream {
        let stream: CandidateStream = match source {
            AddSource::Bytes(bytes) => Box::pin(futures::stream::once(async move {
                Ok(ImportCandidate::content(bytes))
            })),
            AddSource::Candidate(candidate) => {
                Box::pin(futures::stream::once(async move { Ok(candidate) }))
            }
            AddSource::Candidates(candidates) => {
                Box::pin(futures::stream::iter(candidates.into_iter().map(Ok)))
            }
            AddSource::Stream(stream) => stream,
        };

        Box::pin(stream.map(|item| item.and_then(clean_candidate)))
    }
}

fn clean_candidate(mut candidate: ImportCandidate) -> anyhow::Result<ImportCandidate> {
    candidate.path = match candidate.path.take() {
        Some(path) => clean_path(&path)?,
        None => None,
    };
    Ok(candidate)
}

fn clean_path(path: &str) -> anyhow::Result<Option<String>> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => anyhow::bail!("path escapes the add root: {path:?}"),
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}
