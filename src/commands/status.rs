//! `hearth status`: inspect the database without loading a model

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use hearth::config::Config;
use hearth::db::migrations;
use hearth::index::Snapshot;
use hearth::storage::ChunkStore;

#[derive(Serialize)]
struct StatusReport {
    db_path: PathBuf,
    exists: bool,
    schema_version: Option<i64>,
    chunk_count: Option<usize>,
    /// Shared embedding dimension, if the store builds into an index
    dim: Option<usize>,
    /// Why the store does not build into an index
    index_error: Option<String>,
    provider: String,
    model: String,
}

fn inspect(config: &Config) -> StatusReport {
    let db_path = config.store.path.clone();
    let mut report = StatusReport {
        exists: db_path.exists(),
        db_path,
        schema_version: None,
        chunk_count: None,
        dim: None,
        index_error: None,
        provider: format!("{:?}", config.embeddings.provider).to_lowercase(),
        model: config.embeddings.model.clone(),
    };
    if !report.exists {
        return report;
    }

    let store = match ChunkStore::open(&report.db_path) {
        Ok(store) => store,
        Err(e) => {
            report.index_error = Some(e.to_string());
            return report;
        }
    };
    report.schema_version = migrations::schema_version(store.database().connection()).ok();
    report.chunk_count = store.count().ok();
    match Snapshot::build(&store) {
        Ok(snapshot) => report.dim = Some(snapshot.dim()),
        Err(e) => report.index_error = Some(e.to_string()),
    }
    report
}

pub fn execute(config: &Config, json: bool) -> Result<()> {
    let report = inspect(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Database: {}", report.db_path.display());
    if !report.exists {
        println!("  not created yet (run `hearth init`)");
        return Ok(());
    }
    if let Some(version) = report.schema_version {
        println!("  schema:  v{} (latest v{})", version, migrations::SCHEMA_VERSION);
    }
    if let Some(count) = report.chunk_count {
        println!("  chunks:  {}", count);
    }
    match (&report.dim, &report.index_error) {
        (Some(dim), _) => println!("  index:   ✓ dim {}", dim),
        (None, Some(err)) => println!("  index:   ✗ {}", err),
        (None, None) => {}
    }
    println!("Provider: {} ({})", report.provider, report.model);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth::storage::{ChunkKey, NewChunk, Priority};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.store.path = dir.path().join("rag.db");
        config
    }

    #[test]
    fn test_missing_database() {
        let dir = TempDir::new().unwrap();
        let report = inspect(&config(&dir));
        assert!(!report.exists);
        assert!(report.chunk_count.is_none());
    }

    #[test]
    fn test_reports_dim_and_count() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut store = ChunkStore::open(&config.store.path).unwrap();
        store.ensure_schema().unwrap();

        let report = inspect(&config);
        assert_eq!(report.chunk_count, Some(0));
        assert_eq!(report.index_error.as_deref(), Some("chunk store is empty"));

        store
            .upsert(&NewChunk {
                key: ChunkKey {
                    source_path: "a.md".into(),
                    kind: "journal".into(),
                    chunk_index: 0,
                },
                priority: Priority::Normal,
                text: "hay".into(),
                embedding: vec![1.0, 0.0, 0.0],
            })
            .unwrap();

        let report = inspect(&config);
        assert_eq!(report.schema_version, Some(migrations::SCHEMA_VERSION));
        assert_eq!(report.chunk_count, Some(1));
        assert_eq!(report.dim, Some(3));
    }
}
