//! `hearth query`: top-k retrieval without a running daemon

use anyhow::{Context, Result};

use hearth::config::Config;
use hearth::service::{AppContext, RetrieveRequest};

pub struct QueryOptions {
    pub query: String,
    pub topk: i64,
    pub kind: Option<String>,
    pub json: bool,
}

pub fn execute(options: QueryOptions, config: &Config) -> Result<()> {
    let ctx = AppContext::new(&config.store.path);
    ctx.start(&config.embeddings)
        .context("Failed to load memory service")?;

    let mut request = RetrieveRequest::new(&options.query).with_topk(options.topk);
    if let Some(kind) = options.kind.as_deref() {
        request = request.with_kind(kind);
    }

    let hits = ctx.retrieve(&request).map_err(|e| {
        let health = ctx.health();
        match health.last_error {
            Some(reason) if !health.ready => anyhow::anyhow!("{} ({})", e, reason),
            _ => e.into(),
        }
    })?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. [{:.3}] {} ({} #{}, {})",
            rank + 1,
            hit.score,
            hit.source_path,
            hit.kind,
            hit.chunk_index,
            hit.priority
        );
        println!("    {}", hit.text.replace('\n', " "));
    }
    Ok(())
}
