//! Command-line generation client.
//!
//! Usage: `sark-generate <prompt...>`
//!
//! Sends the prompt to the relay (`SARK_RELAY_URL`), logs stage progress and
//! writes `index.html` into the current directory. If an `index.html` already
//! exists there it is sent along as the document to revise.

use std::path::Path;

use anyhow::{Context, bail};
use sark::client::{Artifact, GenerationClient, RelayTransport};
use sark::config::ClientConfig;
use sark::start_relay::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        bail!("usage: sark-generate <prompt...>");
    }

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let client = GenerationClient::new(RelayTransport::new(&config), &config);

    let out_dir = Path::new(".");
    if let Ok(existing) = std::fs::read_to_string(out_dir.join("index.html")) {
        tracing::info!("Revising existing index.html");
        client.seed_artifact(Artifact::new(existing));
    }

    let mut updates = client.subscribe();
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            for stage in &snapshot.stages {
                tracing::debug!(stage = %stage.title, status = ?stage.status, progress = stage.progress);
            }
        }
    });

    let artifact = client
        .start_generation(&prompt)
        .await
        .context("generation failed")?;
    let path = artifact.save_to(out_dir).context("failed to write index.html")?;
    tracing::info!(path = %path.display(), "Done");

    progress.abort();
    Ok(())
}
