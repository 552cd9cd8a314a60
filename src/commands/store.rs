//! `hearth store`: embed and upsert one chunk without a running daemon

use anyhow::{Context, Result};
use std::io::Read;

use hearth::config::Config;
use hearth::service::{AppContext, StoreRequest};

pub struct StoreOptions {
    pub source_path: String,
    pub kind: String,
    pub chunk_index: i64,
    /// Chunk text; read from stdin when absent
    pub text: Option<String>,
    pub priority: Option<String>,
    pub json: bool,
}

pub fn execute(options: StoreOptions, config: &Config) -> Result<()> {
    let text = match options.text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read chunk text from stdin")?;
            buf.trim_end().to_string()
        }
    };

    let ctx = AppContext::new(&config.store.path);
    ctx.start(&config.embeddings)
        .context("Failed to load memory service")?;

    let mut request = StoreRequest::new(&options.source_path, &options.kind, options.chunk_index, &text);
    if let Some(priority) = options.priority.as_deref() {
        request = request.with_priority(priority);
    }

    let response = match ctx.store(&request) {
        Ok(response) => response,
        Err(e) if e.persisted() => {
            eprintln!("⚠️  Chunk was saved but the index could not be refreshed");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!(
            "✓ Stored {} ({} #{}) id={} dim={}",
            options.source_path, options.kind, options.chunk_index, response.id, response.dim
        );
    }
    Ok(())
}
