//! Integration tests for the memory service against a scratch SQLite file
//!
//! Uses the hashing provider so results are deterministic and no model
//! files are needed.

use approx::assert_relative_eq;
use hearth::embeddings::{EmbeddingEngine, HashingEmbedder};
use hearth::service::{AppContext, Phase, RetrieveRequest, StoreRequest};
use hearth::storage::{ChunkKey, ChunkStore, NewChunk, Priority};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 256;

fn start(db_path: &Path) -> AppContext {
    let ctx = AppContext::new(db_path);
    ctx.start_with_provider(Box::new(HashingEmbedder::new(DIM).unwrap()))
        .expect("startup should not fail on provider or schema");
    ctx
}

fn raw_chunk(source_path: &str, chunk_index: i64, embedding: Vec<f32>) -> NewChunk {
    NewChunk {
        key: ChunkKey {
            source_path: source_path.to_string(),
            kind: "journal".to_string(),
            chunk_index,
        },
        priority: Priority::Normal,
        text: format!("{} #{}", source_path, chunk_index),
        embedding,
    }
}

#[test]
fn test_store_into_empty_then_retrieve() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = start(&temp_dir.path().join("db").join("rag.db"));
    assert!(!ctx.is_ready());

    ctx.store(
        &StoreRequest::new("j1.md", "journal", 0, "the cow gave birth today").with_priority("normal"),
    )
    .unwrap();

    let hits = ctx
        .retrieve(&RetrieveRequest::new("the cow gave birth today").with_topk(1))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_path, "j1.md");
    assert_eq!(hits[0].chunk_index, 0);
    assert_eq!(hits[0].priority, Priority::Normal);
    assert_relative_eq!(hits[0].score, 1.0, epsilon = 1e-5);
}

#[test]
fn test_two_chunks_same_source_descending() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = start(&temp_dir.path().join("rag.db"));

    ctx.store(&StoreRequest::new("a.md", "journal", 0, "planted garlic in the east bed"))
        .unwrap();
    ctx.store(&StoreRequest::new("a.md", "journal", 1, "goats escaped through the fence"))
        .unwrap();

    let hits = ctx
        .retrieve(&RetrieveRequest::new("garlic east bed").with_topk(5))
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.source_path == "a.md"));
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].chunk_index, 0);
}

#[test]
fn test_self_similarity_ranks_first() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = start(&temp_dir.path().join("rag.db"));

    let texts = [
        "milked the cows before sunrise",
        "repaired the tractor hydraulic line",
        "ordered seed potatoes for spring",
        "the barn roof leaks near the loft",
        "sold eggs at the saturday market",
    ];
    for (i, text) in texts.iter().enumerate() {
        ctx.store(&StoreRequest::new(&format!("note{}.md", i), "journal", 0, text))
            .unwrap();
    }

    for (i, text) in texts.iter().enumerate() {
        let hits = ctx.retrieve(&RetrieveRequest::new(text)).unwrap();
        assert_eq!(hits[0].source_path, format!("note{}.md", i));
        assert_relative_eq!(hits[0].score, 1.0, epsilon = 1e-5);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_upsert_idempotent_by_natural_key() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rag.db");
    let ctx = start(&db_path);

    let first = ctx
        .store(&StoreRequest::new("k.md", "knowledge", 3, "compost needs turning weekly"))
        .unwrap();
    let second = ctx
        .store(
            &StoreRequest::new("k.md", "knowledge", 3, "compost needs turning every ten days")
                .with_priority("HIGH"),
        )
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.dim, DIM);

    let store = ChunkStore::open(&db_path).unwrap();
    let rows = store.list_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text, "compost needs turning every ten days");
    assert_eq!(rows[0].priority, Priority::High);
    assert_eq!(ctx.health().chunk_count, 1);
}

#[test]
fn test_topk_clamped_to_corpus() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = start(&temp_dir.path().join("rag.db"));
    for i in 0..3 {
        ctx.store(&StoreRequest::new("c.md", "journal", i, &format!("entry number {}", i)))
            .unwrap();
    }

    let hits = ctx
        .retrieve(&RetrieveRequest::new("entry").with_topk(50))
        .unwrap();
    assert_eq!(hits.len(), 3);
}

#[test]
fn test_kind_filter() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = start(&temp_dir.path().join("rag.db"));
    ctx.store(&StoreRequest::new("j.md", "journal", 0, "fed the chickens"))
        .unwrap();
    ctx.store(&StoreRequest::new("k.md", "knowledge", 0, "chickens need grit"))
        .unwrap();
    ctx.store(&StoreRequest::new("j.md", "journal", 1, "chickens laid nine eggs"))
        .unwrap();

    let hits = ctx
        .retrieve(&RetrieveRequest::new("chickens").with_topk(10).with_kind("journal"))
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.kind == "journal"));

    let hits = ctx
        .retrieve(&RetrieveRequest::new("chickens").with_kind("recipes"))
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_kind_filter_clamps_to_matching_rows() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = start(&temp_dir.path().join("rag.db"));
    for i in 0..4 {
        ctx.store(&StoreRequest::new("k.md", "knowledge", i, &format!("soil fact {}", i)))
            .unwrap();
    }
    for i in 0..3 {
        ctx.store(&StoreRequest::new("j.md", "journal", i, &format!("soil day {}", i)))
            .unwrap();
    }

    let hits = ctx
        .retrieve(&RetrieveRequest::new("soil").with_topk(50).with_kind("journal"))
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.kind == "journal"));

    let hits = ctx
        .retrieve(&RetrieveRequest::new("soil").with_topk(2).with_kind("knowledge"))
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.kind == "knowledge"));
}

#[test]
fn test_mixed_dimensions_never_ready() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rag.db");
    {
        let mut store = ChunkStore::open(&db_path).unwrap();
        store.ensure_schema().unwrap();
        store.upsert(&raw_chunk("a.md", 0, vec![1.0, 0.0, 0.0])).unwrap();
        store.upsert(&raw_chunk("b.md", 0, vec![1.0, 0.0, 0.0, 0.0])).unwrap();
    }

    let ctx = start(&db_path);
    let health = ctx.health();
    assert!(!health.ready);
    assert_eq!(health.phase, Phase::Failed);
    assert!(health
        .last_error
        .as_deref()
        .unwrap()
        .contains("inconsistent embedding dimension"));

    let err = ctx.retrieve(&RetrieveRequest::new("hay")).unwrap_err();
    assert_eq!(err.kind(), "not_ready");
    assert_eq!(ctx.reload().unwrap_err().kind(), "reload_failed");
    assert!(!ctx.is_ready());
}

#[test]
fn test_startup_loads_existing_store() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rag.db");
    {
        let ctx = start(&db_path);
        ctx.store(&StoreRequest::new("a.md", "journal", 0, "hay bales stacked"))
            .unwrap();
    }

    let ctx = start(&db_path);
    let health = ctx.health();
    assert!(health.ready);
    assert_eq!(health.status, "ok");
    assert_eq!(health.phase, Phase::Ready);
    assert_eq!(health.chunk_count, 1);
    assert_eq!(health.dim, DIM);
    assert!(health.loaded_at.is_some());
}

#[test]
fn test_external_writes_visible_after_reload() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rag.db");
    let ctx = start(&db_path);
    ctx.store(&StoreRequest::new("a.md", "journal", 0, "first"))
        .unwrap();

    let mut embedder = HashingEmbedder::new(DIM).unwrap();
    let embedding = embedder.embed("second").unwrap();
    let mut store = ChunkStore::open(&db_path).unwrap();
    store.upsert(&raw_chunk("b.md", 0, embedding)).unwrap();
    assert_eq!(ctx.health().chunk_count, 1);

    assert_eq!(ctx.reload().unwrap().chunk_count, 2);
    assert_eq!(store.delete_by_source("b.md").unwrap(), 1);
    assert_eq!(ctx.reload().unwrap().chunk_count, 1);
}

#[test]
fn test_retrieve_sees_old_or_new_snapshot_under_concurrent_stores() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = Arc::new(start(&temp_dir.path().join("rag.db")));
    ctx.store(&StoreRequest::new("n0.md", "journal", 0, "note zero"))
        .unwrap();

    const WRITES: usize = 15;
    let writer = {
        let ctx = Arc::clone(&ctx);
        std::thread::spawn(move || {
            for i in 1..=WRITES {
                ctx.store(&StoreRequest::new(&format!("n{}.md", i), "journal", 0, &format!("note {}", i)))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || {
                let mut last_len = 0;
                for _ in 0..40 {
                    let hits = ctx
                        .retrieve(&RetrieveRequest::new("note").with_topk(50))
                        .unwrap();
                    // Every snapshot holds exactly the first n stored chunks
                    let seen: HashSet<String> = hits.into_iter().map(|h| h.source_path).collect();
                    let expected: HashSet<String> =
                        (0..seen.len()).map(|i| format!("n{}.md", i)).collect();
                    assert_eq!(seen, expected);
                    assert!(seen.len() >= last_len);
                    last_len = seen.len();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(ctx.health().chunk_count, WRITES + 1);
}
