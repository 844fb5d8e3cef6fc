use bytes::Bytes;
use cid::Version;
use dagadd_core::content_id::{DAG_PB, RAW};
use dagadd_core::testutil::random_bytes;
use dagadd_core::{
    Blockstore, CandidateStream, Chunker, Content, HashAlg, ImportCandidate, ImportedNode, Importer,
    ImporterOptions, Mtime, UnixFsMeta,
};
use dagadd_importer_flat::FlatImporter;
use dagadd_store_memory::MemoryBlockstore;
use futures::TryStreamExt;
use std::sync::{Arc, Mutex};

fn source(candidates: Vec<ImportCandidate>) -> CandidateStream {
    Box::pin(futures::stream::iter(candidates.into_iter().map(Ok)))
}

async fn import(
    candidates: Vec<ImportCandidate>,
    options: ImporterOptions,
) -> (Vec<ImportedNode>, Arc<MemoryBlockstore>) {
    let store = Arc::new(MemoryBlockstore::new());
    let nodes = FlatImporter::new()
        .import(source(candidates), store.clone(), options)
        .try_collect()
        .await
        .unwrap();
    (nodes, store)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_small_file_v0() {
    let (nodes, store) = import(
        vec![ImportCandidate::content("hello world\n")],
        ImporterOptions::default(),
    )
    .await;

    assert_eq!(nodes.len(), 1);
    let node = &nodes[0];
    assert_eq!(node.path, "");
    assert_eq!(node.cid.version(), Version::V0);
    assert_eq!(node.cid.codec(), DAG_PB);
    assert!(node.unixfs.is_none());

    let block = store.get(&node.cid).await.unwrap();
    assert!(contains(&block, b"hello world\n"));
    assert_eq!(node.size, block.len() as u64);
}

#[tokio::test]
async fn test_raw_leaves() {
    let options = ImporterOptions {
        cid_version: Version::V1,
        raw_leaves: true,
        ..Default::default()
    };
    let (nodes, store) = import(vec![ImportCandidate::file("a.txt", "abc")], options).await;

    let node = &nodes[0];
    assert_eq!(node.cid.codec(), RAW);
    assert_eq!(node.cid.version(), Version::V1);
    assert_eq!(node.size, 3);
    assert_eq!(store.get(&node.cid).await.unwrap(), Bytes::from_static(b"abc"));
}

#[tokio::test]
async fn test_metadata_keeps_dag_pb_root() {
    let meta = UnixFsMeta {
        mode: Some(0o755),
        mtime: Some(Mtime::new(1_600_000_000, 0)),
    };
    let options = ImporterOptions {
        cid_version: Version::V1,
        raw_leaves: true,
        ..Default::default()
    };
    let candidate = ImportCandidate::file("run.sh", "#!/bin/sh\n")
        .with_mode(0o755)
        .with_mtime(Mtime::new(1_600_000_000, 0));
    let (nodes, _) = import(vec![candidate], options).await;

    assert_eq!(nodes[0].cid.codec(), DAG_PB);
    assert_eq!(nodes[0].unixfs, Some(meta));
}

#[tokio::test]
async fn test_fixed_size_chunks_and_progress() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = ImporterOptions {
        chunker: Chunker::FixedSize { size: 1024 },
        cid_version: Version::V1,
        raw_leaves: true,
        progress: Some(Arc::new(move |n| sink.lock().unwrap().push(n))),
        ..Default::default()
    };
    let data = random_bytes(2500);
    let (nodes, store) = import(vec![ImportCandidate::file("big", data.clone())], options).await;

    assert_eq!(*seen.lock().unwrap(), vec![1024, 1024, 452]);
    // Three raw leaves plus the root.
    assert_eq!(store.len(), 4);
    let root = &nodes[0];
    assert_eq!(root.cid.codec(), DAG_PB);
    assert!(root.size > 2500);
}

#[tokio::test]
async fn test_streamed_content_matches_bytes() {
    let data = random_bytes(5000);
    let chunks: Vec<std::io::Result<Bytes>> = data
        .chunks(700)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    let streamed = Content::Stream(Box::pin(futures::stream::iter(chunks)));
    let options = || ImporterOptions {
        chunker: Chunker::FixedSize { size: 1024 },
        ..Default::default()
    };

    let (a, _) = import(vec![ImportCandidate::file("f", streamed)], options()).await;
    let (b, _) = import(vec![ImportCandidate::file("f", data)], options()).await;
    assert_eq!(a[0].cid, b[0].cid);
}

#[tokio::test]
async fn test_wide_file_gets_two_levels() {
    let options = ImporterOptions {
        chunker: Chunker::FixedSize { size: 1 },
        cid_version: Version::V1,
        raw_leaves: true,
        ..Default::default()
    };
    let data = random_bytes(dagadd_importer_flat::MAX_LINKS + 1);
    let (_, store) = import(vec![ImportCandidate::file("wide", data)], options).await;

    let pb_blocks = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.codec() == DAG_PB)
        .count();
    // Two interior nodes and the root.
    assert_eq!(pb_blocks, 3);
}

#[tokio::test]
async fn test_rabin_chunking() {
    let options = ImporterOptions {
        chunker: Chunker::Rabin {
            min: 1024,
            avg: 4096,
            max: 8192,
        },
        cid_version: Version::V1,
        raw_leaves: true,
        ..Default::default()
    };
    let data = random_bytes(64 * 1024);
    let (first, store) = import(
        vec![ImportCandidate::file("r", data.clone())],
        options.clone(),
    )
    .await;
    let (second, _) = import(vec![ImportCandidate::file("r", data)], options).await;

    assert_eq!(first[0].cid, second[0].cid);
    assert!(store.len() > 2);
}

#[tokio::test]
async fn test_directory_tree_order() {
    let (nodes, store) = import(
        vec![
            ImportCandidate::dir("dir"),
            ImportCandidate::file("dir/a.txt", "a"),
            ImportCandidate::file("dir/sub/b.txt", "b"),
        ],
        ImporterOptions::default(),
    )
    .await;

    let paths: Vec<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(paths, vec!["dir/a.txt", "dir/sub/b.txt", "dir/sub", "dir"]);

    let root = nodes.last().unwrap();
    let block = store.get(&root.cid).await.unwrap();
    assert!(contains(&block, b"a.txt"));
    assert!(contains(&block, b"sub"));
    assert!(contains(&block, &nodes[2].cid.to_bytes()));
    // Cumulative size covers the children.
    assert!(root.size > nodes[2].size + nodes[0].size);
}

#[tokio::test]
async fn test_wrap_with_directory() {
    let options = ImporterOptions {
        wrap_with_directory: true,
        ..Default::default()
    };
    let (nodes, store) = import(
        vec![
            ImportCandidate::file("b.txt", "b"),
            ImportCandidate::file("a.txt", "a"),
        ],
        options,
    )
    .await;

    let paths: Vec<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(paths, vec!["b.txt", "a.txt", ""]);

    let wrapper = store.get(&nodes[2].cid).await.unwrap();
    let a = wrapper.windows(5).position(|w| w == b"a.txt").unwrap();
    let b = wrapper.windows(5).position(|w| w == b"b.txt").unwrap();
    assert!(a < b, "links are sorted by name");
}

#[tokio::test]
async fn test_empty_directory_block() {
    let (nodes, store) =
        import(vec![ImportCandidate::dir("empty")], ImporterOptions::default()).await;

    assert_eq!(nodes.len(), 1);
    assert_eq!(
        nodes[0].cid.to_string(),
        "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn"
    );
    assert_eq!(
        store.get(&nodes[0].cid).await.unwrap(),
        Bytes::from_static(&[0x0a, 0x02, 0x08, 0x01])
    );
}

#[tokio::test]
async fn test_only_hash_writes_nothing() {
    let options = ImporterOptions {
        only_hash: true,
        ..Default::default()
    };
    let (hashed, store) = import(vec![ImportCandidate::file("x", "data")], options).await;
    assert!(store.is_empty());

    let (written, _) = import(
        vec![ImportCandidate::file("x", "data")],
        ImporterOptions::default(),
    )
    .await;
    assert_eq!(hashed[0].cid, written[0].cid);
}

#[tokio::test]
async fn test_non_default_hash() {
    let options = ImporterOptions {
        hash_alg: HashAlg::Blake3,
        ..Default::default()
    };
    let (nodes, _) = import(vec![ImportCandidate::file("x", "data")], options).await;
    assert_eq!(nodes[0].cid.version(), Version::V1);
    assert_eq!(nodes[0].cid.hash().code(), HashAlg::Blake3.code());
}

#[tokio::test]
async fn test_source_errors_pass_through() {
    let store = Arc::new(MemoryBlockstore::new());
    let source: CandidateStream = Box::pin(futures::stream::iter(vec![
        Ok(ImportCandidate::file("a", "a")),
        Err(anyhow::anyhow!("source broke")),
    ]));
    let mut nodes = FlatImporter::new().import(source, store, ImporterOptions::default());

    assert!(nodes.try_next().await.unwrap().is_some());
    let err = nodes.try_next().await.unwrap_err();
    assert_eq!(err.to_string(), "source broke");
}

#[tokio::test]
async fn test_wrapped_unnamed_file_is_named_by_cid() {
    let options = ImporterOptions {
        wrap_with_directory: true,
        ..Default::default()
    };
    let (nodes, store) = import(vec![ImportCandidate::content("hello world\n")], options).await;

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].path, nodes[0].cid.to_string());
    assert_eq!(nodes[1].path, "");

    let wrapper = store.get(&nodes[1].cid).await.unwrap();
    assert!(contains(&wrapper, nodes[0].path.as_bytes()));
}
