//! `hearth init`: write the default config and prepare the database

use anyhow::{Context, Result};
use std::path::Path;

use hearth::config::Config;
use hearth::db::migrations;
use hearth::storage::ChunkStore;

pub fn execute(config_path: &Path, config: &Config) -> Result<()> {
    if Config::write_default(config_path)? {
        println!("✓ Wrote default config to {}", config_path.display());
    } else {
        println!("  Config already exists at {}", config_path.display());
    }

    let db_path = &config.store.path;
    let mut store = ChunkStore::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    store
        .ensure_schema()
        .with_context(|| format!("Failed to migrate {}", db_path.display()))?;

    let version = migrations::schema_version(store.database().connection())?;
    println!(
        "✓ Database ready at {} (schema v{}, {} chunks)",
        db_path.display(),
        version,
        store.count()?
    );
    Ok(())
}
