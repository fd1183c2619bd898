//! Sluice push client binary.

use anyhow::{Context, Result};
use clap::Parser;
use sluice_client::{Dispatcher, DispatcherOptions};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Upload files to a sluice server in chunks
#[derive(Parser, Debug)]
#[command(name = "sluice-push")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server base URL
    #[arg(short, long, env = "SLUICE_URL", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Gate secret, if the server requires one
    #[arg(short, long, env = "SLUICE_TOKEN")]
    token: Option<String>,

    /// Declared MIME type for every file
    #[arg(long, default_value = "application/octet-stream")]
    content_type: String,

    /// Maximum chunk uploads in flight per file
    #[arg(short, long, default_value_t = 4)]
    parallelism: usize,

    /// Per-chunk retry budget
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let dispatcher = Dispatcher::new(
        &args.server,
        args.token.clone(),
        DispatcherOptions {
            parallelism: args.parallelism,
            max_retries: args.retries,
            ..Default::default()
        },
    );

    // Ctrl-C flips the token; in-flight chunk requests are aborted and no
    // new ones start. Partial server-side state is harmless: unacknowledged
    // chunks were never recorded, and the session resumes by fingerprint.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling...");
                cancel.cancel();
            }
        });
    }

    let files: Vec<(PathBuf, String)> = args
        .files
        .iter()
        .map(|path| (path.clone(), args.content_type.clone()))
        .collect();

    let outcome = dispatcher
        .upload_batch(&files, &cancel, &|path, done, total| {
            println!("  {}: {done}/{total} chunks", path.display());
        })
        .await
        .context("upload failed")?;

    println!(
        "Done: {} upload(s) complete{}",
        outcome.upload_ids.len(),
        if outcome.multi_file { " (multi-file batch)" } else { "" }
    );
    for upload_id in &outcome.upload_ids {
        println!("  {upload_id}");
    }

    Ok(())
}
