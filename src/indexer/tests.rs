use super::*;
use crate::database::{MemoryStore, SearchResult, StoredChunk};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Embeds text as letter-frequency vectors; fails on sections containing "FAIL"
#[derive(Default)]
struct LetterEmbedder {
    inputs: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inputs
            .lock()
            .expect("inputs lock")
            .push(text.to_string());
        if text.contains("FAIL") {
            return Err(DocsError::Embedding("model rejected input".to_string()));
        }
        let mut vector = vec![0.0; 26];
        for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
            vector[usize::from(c - b'a')] += 1.0;
        }
        Ok(vector)
    }
}

/// Memory store whose delete step can be made to fail
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_delete: bool,
    deletes: AtomicUsize,
}

#[async_trait]
impl ChunkStore for FlakyStore {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Vec<StoredChunk>> {
        self.inner.find_by_source_url(source_url).await
    }

    async fn delete_by_source_url(&self, source_url: &str) -> Result<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(DocsError::Database("delete failed".to_string()));
        }
        self.inner.delete_by_source_url(source_url).await
    }

    async fn insert(&self, record: ChunkRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn source_urls_for_document(&self, document_path: &str) -> Result<Vec<String>> {
        self.inner.source_urls_for_document(document_path).await
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.inner.nearest_neighbors(query, threshold, limit).await
    }

    async fn count_chunks(&self, source_url: Option<&str>) -> Result<u64> {
        self.inner.count_chunks(source_url).await
    }
}

fn sections(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| (*t).to_string()).collect()
}

fn reindexer_with(store: Arc<dyn ChunkStore>, embedder: Arc<LetterEmbedder>) -> Reindexer {
    Reindexer::new(store, embedder)
}

const URL: &str = "https://aframe.io/docs/master/a.md";

#[tokio::test]
async fn second_reindex_replaces_first() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));

    reindexer
        .reindex(&sections(&["one", "two", "three"]), URL)
        .await
        .expect("first reindex should succeed");
    let report = reindexer
        .reindex(&sections(&["alpha", "beta"]), URL)
        .await
        .expect("second reindex should succeed");

    assert_eq!(report.removed, 3);
    assert_eq!(report.inserted, 2);

    let stored = store.find_by_source_url(URL).await.expect("find");
    let mut contents: Vec<&str> = stored.iter().map(|c| c.metadata.content.as_str()).collect();
    contents.sort_unstable();
    assert_eq!(contents, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn identical_rerun_does_not_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));
    let doc = sections(&["", "Intro\nHello", "Usage\nUse it like this"]);

    reindexer.reindex(&doc, URL).await.expect("reindex");
    let first = store.count_chunks(Some(URL)).await.expect("count");
    reindexer.reindex(&doc, URL).await.expect("reindex");
    let second = store.count_chunks(Some(URL)).await.expect("count");

    assert_eq!(first, 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn other_documents_are_untouched() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));

    reindexer
        .reindex(&sections(&["b"]), "https://aframe.io/docs/master/b.md")
        .await
        .expect("reindex");
    reindexer
        .reindex(&sections(&["a1", "a2"]), URL)
        .await
        .expect("reindex");
    reindexer
        .reindex(&sections(&["a3"]), URL)
        .await
        .expect("reindex");

    assert_eq!(
        store
            .count_chunks(Some("https://aframe.io/docs/master/b.md"))
            .await
            .expect("count"),
        1
    );
    assert_eq!(store.count_chunks(None).await.expect("count"), 2);
}

#[tokio::test]
async fn embeds_flattened_text_but_stores_raw_section() {
    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(LetterEmbedder::default());
    let reindexer = reindexer_with(store.clone(), embedder.clone());

    reindexer
        .reindex(&sections(&["Intro\nHello"]), URL)
        .await
        .expect("reindex");

    let inputs = embedder.inputs.lock().expect("inputs lock").clone();
    assert_eq!(inputs, vec!["Intro Hello"]);

    let stored = store.find_by_source_url(URL).await.expect("find");
    assert_eq!(stored[0].metadata.content, "Intro\nHello");
    assert_eq!(stored[0].metadata.section_index, 0);
}

#[tokio::test]
async fn failed_section_does_not_abort_siblings() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));

    let error = reindexer
        .reindex(&sections(&["first", "FAIL here", "third"]), URL)
        .await
        .expect_err("partial failure should be reported");

    match error {
        DocsError::PartialReindex {
            source_url,
            failed_sections,
        } => {
            assert_eq!(source_url, URL);
            assert_eq!(failed_sections, vec![1]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let stored = store.find_by_source_url(URL).await.expect("find");
    let indexes: Vec<u32> = {
        let mut indexes: Vec<u32> = stored.iter().map(|c| c.metadata.section_index).collect();
        indexes.sort_unstable();
        indexes
    };
    assert_eq!(indexes, vec![0, 2]);
}

#[tokio::test]
async fn failed_delete_aborts_before_insert() {
    let store = Arc::new(FlakyStore::default());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));
    reindexer
        .reindex(&sections(&["old"]), URL)
        .await
        .expect("first reindex should succeed");
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);

    let failing = Arc::new(FlakyStore {
        fail_delete: true,
        ..FlakyStore::default()
    });
    failing
        .insert(ChunkRecord::new(URL, "old", 0, vec![1.0]))
        .await
        .expect("seed insert");
    let embedder = Arc::new(LetterEmbedder::default());
    let reindexer = reindexer_with(failing.clone(), embedder.clone());

    let error = reindexer
        .reindex(&sections(&["new one", "new two"]), URL)
        .await
        .expect_err("delete failure should abort");

    assert!(matches!(error, DocsError::Database(_)));
    assert!(embedder.inputs.lock().expect("inputs lock").is_empty());
    let stored = failing.find_by_source_url(URL).await.expect("find");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metadata.content, "old");
}

#[tokio::test]
async fn empty_section_list_clears_document() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));

    reindexer
        .reindex(&sections(&["one", "two"]), URL)
        .await
        .expect("reindex");
    let report = reindexer.reindex(&[], URL).await.expect("reindex");

    assert_eq!(report.removed, 2);
    assert_eq!(report.inserted, 0);
    assert_eq!(store.count_chunks(Some(URL)).await.expect("count"), 0);
}

#[tokio::test]
async fn concurrent_reindexes_of_one_url_leave_one_generation() {
    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(LetterEmbedder {
        delay: Some(Duration::from_millis(2)),
        ..LetterEmbedder::default()
    });
    let reindexer = reindexer_with(store.clone(), embedder);

    let tasks: Vec<_> = (0..6)
        .map(|round| {
            let reindexer = reindexer.clone();
            tokio::spawn(async move {
                let doc: Vec<String> = (0..4).map(|i| format!("round {round} section {i}")).collect();
                reindexer.reindex(&doc, URL).await
            })
        })
        .collect();

    for task in tasks {
        task.await
            .expect("task should finish")
            .expect("reindex should succeed");
    }

    let stored = store.find_by_source_url(URL).await.expect("find");
    assert_eq!(stored.len(), 4);
    let round = stored[0]
        .metadata
        .content
        .split_whitespace()
        .nth(1)
        .expect("round number")
        .to_string();
    assert!(
        stored
            .iter()
            .all(|c| c.metadata.content.split_whitespace().nth(1) == Some(round.as_str())),
        "chunks from more than one generation survived"
    );
}

#[tokio::test]
async fn purge_removes_document() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));

    reindexer
        .reindex(&sections(&["one", "two"]), URL)
        .await
        .expect("reindex");
    let removed = reindexer.purge(URL).await.expect("purge");

    assert_eq!(removed, 2);
    assert_eq!(store.count_chunks(None).await.expect("count"), 0);
}

#[tokio::test]
async fn document_path_is_recorded_on_every_chunk() {
    let store = Arc::new(MemoryStore::new());
    let reindexer = reindexer_with(store.clone(), Arc::new(LetterEmbedder::default()));

    reindexer
        .reindex_document(&sections(&["one", "two"]), URL, "docs/components/camera.md")
        .await
        .expect("reindex");

    let stored = store.find_by_source_url(URL).await.expect("find");
    assert_eq!(stored.len(), 2);
    assert!(
        stored
            .iter()
            .all(|c| c.metadata.document_path == "docs/components/camera.md")
    );
    assert_eq!(
        store
            .source_urls_for_document("docs/components/camera.md")
            .await
            .expect("lookup"),
        vec![URL]
    );
}

#[test]
fn report_into_result() {
    let complete = ReindexReport {
        source_url: URL.to_string(),
        inserted: 2,
        ..ReindexReport::default()
    };
    assert!(complete.clone().into_result().is_ok());

    let partial = ReindexReport {
        failed_sections: vec![0],
        ..complete
    };
    assert!(!partial.is_complete());
    assert!(matches!(
        partial.into_result(),
        Err(DocsError::PartialReindex { .. })
    ));
}
