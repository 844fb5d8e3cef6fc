use crate::AddError;
use cid::{Cid, Version};
use dagadd_core::content_id::to_v1;
use dagadd_core::{ImportedNode, Mtime, NodeStream};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// One entry yielded by an add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedEntry {
    /// Path relative to the add root. Empty for the wrapping directory.
    pub path: String,
    pub cid: Cid,
    pub size: u64,
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

/// Maps importer nodes to [`AddedEntry`] values.
///
/// Converts CIDs to v1 when v1 was requested and fills in the path of
/// unnamed nodes with their CID.
pub struct EntryTransform {
    nodes: NodeStream,
    cid_version: Version,
    wrap_with_directory: bool,
}

impl EntryTransform {
    pub fn new(nodes: NodeStream, cid_version: Version, wrap_with_directory: bool) -> Self {
        Self {
            nodes,
            cid_version,
            wrap_with_directory,
        }
    }

    fn transform(&self, node: ImportedNode) -> Result<AddedEntry, AddError> {
        let cid = match self.cid_version {
            Version::V1 => to_v1(node.cid).map_err(AddError::Import)?,
            Version::V0 => node.cid,
        };

        let path = if !node.path.is_empty() {
            node.path
        } else if self.wrap_with_directory {
            String::new()
        } else {
            cid.to_string()
        };

        let meta = node.unixfs.unwrap_or_default();
        Ok(AddedEntry {
            path,
            cid,
            size: node.size,
            mode: meta.mode,
            mtime: meta.mtime,
        })
    }
}

impl Stream for EntryTransform {
    type Item = Result<AddedEntry, AddError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.nodes.as_mut().poll_next(cx);
        match polled {
            Poll::Ready(Some(Ok(node))) => Poll::Ready(Some(this.transform(node))),
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(AddError::Import(err)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagadd_core::UnixFsMeta;
    use dagadd_core::testutil::{node, node_with_meta};
    use futures::StreamExt;

    fn transform(
        nodes: Vec<anyhow::Result<ImportedNode>>,
        cid_version: Version,
        wrap: bool,
    ) -> EntryTransform {
        EntryTransform::new(Box::pin(futures::stream::iter(nodes)), cid_version, wrap)
    }

    #[tokio::test]
    async fn test_keeps_v0_and_paths() {
        let imported = node("dir/a.txt");
        let entries: Vec<_> = transform(vec![Ok(imported.clone())], Version::V0, false)
            .collect()
            .await;

        let entry = entries.into_iter().next().unwrap().unwrap();
        assert_eq!(entry.cid, imported.cid);
        assert_eq!(entry.path, "dir/a.txt");
        assert_eq!(entry.size, 16);
        assert_eq!(entry.mode, None);
        assert_eq!(entry.mtime, None);
    }

    #[tokio::test]
    async fn test_converts_to_v1() {
        let imported = node("a.txt");
        assert_eq!(imported.cid.version(), Version::V0);

        let mut stream = transform(vec![Ok(imported.clone())], Version::V1, false);
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.cid.version(), Version::V1);
        assert_eq!(entry.cid.hash(), imported.cid.hash());
        assert_eq!(entry.cid.codec(), imported.cid.codec());
    }

    #[tokio::test]
    async fn test_unnamed_node_path() {
        let imported = node("");

        let mut stream = transform(vec![Ok(imported.clone())], Version::V0, false);
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.path, imported.cid.to_string());

        let mut stream = transform(vec![Ok(imported.clone())], Version::V1, false);
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.path, entry.cid.to_string());
        assert!(entry.path.starts_with('b'));

        let mut stream = transform(vec![Ok(imported)], Version::V0, true);
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.path, "");
    }

    #[tokio::test]
    async fn test_copies_unixfs_meta() {
        let meta = UnixFsMeta {
            mode: Some(0o644),
            mtime: Some(Mtime::new(1_700_000_000, 5)),
        };
        let mut stream = transform(vec![Ok(node_with_meta("a.txt", meta))], Version::V0, false);
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.mode, Some(0o644));
        assert_eq!(entry.mtime, Some(Mtime::new(1_700_000_000, 5)));
    }

    #[tokio::test]
    async fn test_importer_errors_pass_through() {
        let mut stream = transform(
            vec![Ok(node("a")), Err(anyhow::anyhow!("disk on fire"))],
            Version::V0,
            false,
        );
        assert!(stream.next().await.unwrap().is_ok());
        match stream.next().await.unwrap() {
            Err(AddError::Import(err)) => assert_eq!(err.to_string(), "disk on fire"),
            other => panic!("expected import error, got {other:?}"),
        }
    }
}
