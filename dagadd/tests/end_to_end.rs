use bytes::Bytes;
use cid::Version;
use dagadd::{AddContext, AddOptions, AddedEntry, Adder};
use dagadd_core::testutil::{RecordingPreload, random_bytes};
use dagadd_core::{AddSource, Blockstore, GcLock, ImportCandidate, MemoryPins, Pins, RepoLock};
use dagadd_importer_flat::FlatImporter;
use dagadd_store_memory::MemoryBlockstore;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;

struct Repo {
    store: Arc<MemoryBlockstore>,
    pins: MemoryPins,
    lock: RepoLock,
    preload: RecordingPreload,
    adder: Adder,
}

fn repo() -> Repo {
    let store = Arc::new(MemoryBlockstore::new());
    let lock = RepoLock::new();
    let pins = MemoryPins::new(Arc::new(lock.clone()));
    let preload = RecordingPreload::new();
    let ctx = AddContext::new(
        store.clone(),
        Arc::new(FlatImporter::new()),
        Arc::new(pins.clone()),
        Arc::new(lock.clone()),
    )
    .with_preload(Arc::new(preload.clone()));
    Repo {
        store,
        pins,
        lock,
        preload,
        adder: Adder::new(ctx),
    }
}

fn tree() -> Vec<ImportCandidate> {
    vec![
        ImportCandidate::dir("photos"),
        ImportCandidate::file("photos/a.jpg", random_bytes(3000)),
        ImportCandidate::file("photos/2024/b.jpg", random_bytes(1000)),
        ImportCandidate::file("./photos//notes.txt", "keep these"),
    ]
}

#[tokio::test]
async fn test_add_directory_tree() {
    let repo = repo();
    let entries: Vec<AddedEntry> = repo
        .adder
        .add_all(tree(), AddOptions::default())
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "photos/a.jpg",
            "photos/2024/b.jpg",
            "photos/notes.txt",
            "photos/2024",
            "photos"
        ]
    );

    let root = entries.last().unwrap();
    assert_eq!(root.cid.version(), Version::V0);
    assert!(repo.store.has(&root.cid).await.unwrap());
    assert_eq!(repo.pins.ls().await.unwrap().len(), 1);
    assert!(repo.pins.is_pinned(&root.cid).await.unwrap());
    assert_eq!(repo.preload.preloaded(), vec![root.cid]);
}

#[tokio::test]
async fn test_add_bytes_v1() {
    let repo = repo();
    let entry = repo
        .adder
        .add(
            Bytes::from_static(b"hello world\n"),
            AddOptions {
                cid_version: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(entry.cid.version(), Version::V1);
    assert_eq!(entry.path, entry.cid.to_string());
    assert_eq!(entry.size, 12);
    assert_eq!(
        repo.store.get(&entry.cid).await.unwrap(),
        Bytes::from_static(b"hello world\n")
    );
    assert!(repo.pins.is_pinned(&entry.cid).await.unwrap());
}

#[tokio::test]
async fn test_only_hash_matches_real_add() {
    let repo = repo();
    let content = random_bytes(10_000);
    let options = || AddOptions {
        chunker: Some("size-4096".into()),
        ..Default::default()
    };

    let hashed = repo
        .adder
        .add(
            ImportCandidate::file("f.bin", content.clone()),
            AddOptions {
                only_hash: true,
                ..options()
            },
        )
        .await
        .unwrap();
    assert!(repo.store.is_empty());
    assert!(repo.pins.ls().await.unwrap().is_empty());

    let added = repo
        .adder
        .add(ImportCandidate::file("f.bin", content), options())
        .await
        .unwrap();
    assert_eq!(hashed.cid, added.cid);
    assert!(!repo.store.is_empty());
}

#[tokio::test]
async fn test_wrap_with_directory() {
    let repo = repo();
    let entries: Vec<AddedEntry> = repo
        .adder
        .add_all(
            vec![
                ImportCandidate::file("a.txt", "a"),
                ImportCandidate::file("b.txt", "b"),
            ],
            AddOptions {
                wrap_with_directory: true,
                ..Default::default()
            },
        )
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let wrapper = entries.last().unwrap();
    assert_eq!(wrapper.path, "");
    // The direct children are pinned along with the wrapper.
    assert_eq!(repo.pins.ls().await.unwrap().len(), 3);
    assert_eq!(repo.preload.preloaded(), vec![wrapper.cid]);
}

#[tokio::test]
async fn test_streamed_source() {
    let repo = repo();
    let candidates = futures::stream::iter(vec![
        Ok(ImportCandidate::file("docs/readme.md", "# docs")),
        Ok(ImportCandidate::file("docs/guide.md", "guide")),
    ]);
    let source = AddSource::Stream(Box::pin(candidates));

    let root = repo.adder.add(source, AddOptions::default()).await.unwrap();
    assert_eq!(root.path, "docs");
    assert!(repo.pins.is_pinned(&root.cid).await.unwrap());
}

#[tokio::test]
async fn test_escaping_path_is_rejected() {
    let repo = repo();
    let err = repo
        .adder
        .add(
            ImportCandidate::file("../etc/passwd", "nope"),
            AddOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("escapes the add root"));
    assert!(repo.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pinning_with_queued_gc() {
    let repo = repo();
    let mut stream = repo.adder.add_all(tree(), AddOptions::default()).unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.path, "photos/a.jpg");

    // A writer queues behind the running add. New readers would now wait,
    // so the root pin must not ask for the lock again.
    let lock = repo.lock.clone();
    let gc = tokio::spawn(async move {
        let guard = lock.write_lock().await;
        guard.release();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let rest: Vec<AddedEntry> = tokio::time::timeout(Duration::from_secs(5), stream.try_collect())
        .await
        .expect("add deadlocked behind the gc writer")
        .unwrap();
    assert_eq!(rest.last().unwrap().path, "photos");
    assert!(repo.pins.is_pinned(&rest.last().unwrap().cid).await.unwrap());

    gc.await.unwrap();
}

#[tokio::test]
async fn test_wrapped_bytes_have_a_single_root() {
    let repo = repo();
    let entries: Vec<AddedEntry> = repo
        .adder
        .add_all(
            Bytes::from_static(b"hello world\n"),
            AddOptions {
                wrap_with_directory: true,
                ..Default::default()
            },
        )
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    let (file, wrapper) = (&entries[0], &entries[1]);
    assert_eq!(
        file.cid.to_string(),
        "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o"
    );
    assert_eq!(file.path, file.cid.to_string());
    assert_eq!(wrapper.path, "");

    assert_eq!(repo.preload.preloaded(), vec![wrapper.cid]);
    assert!(repo.pins.is_pinned(&wrapper.cid).await.unwrap());
    assert!(repo.pins.is_pinned(&file.cid).await.unwrap());
    assert_eq!(repo.pins.ls().await.unwrap().len(), 2);
}
