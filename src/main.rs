use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use bauklar_upload::utils::{format_bytes, format_duration, progress_bar};
use bauklar_upload::{Config, FilePayload, HttpUploadApi, UploadQueue, UploadStatus, UploadTask};

/// Upload inspection photos and documents for an order.
#[derive(Parser, Debug)]
#[command(name = "bauklar-upload", version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Order the files belong to
    #[arg(long)]
    order: String,

    /// Area label, e.g. "roof" or "cellar"
    #[arg(long)]
    area: String,

    /// Free-text note saved for the area before uploading
    #[arg(long)]
    note: Option<String>,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

async fn read_payload(path: &Path) -> Result<FilePayload> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;

    Ok(FilePayload::new(name, content_type_for(path), content))
}

fn print_task(task: &UploadTask) {
    match task.status {
        UploadStatus::Completed => println!(
            "{} {} {} -> {}",
            progress_bar(100, 20),
            task.file.name,
            format_bytes(task.file.size),
            task.result_url.as_deref().unwrap_or("-"),
        ),
        UploadStatus::Failed => println!(
            "{} {} failed: {}",
            progress_bar(task.progress, 20),
            task.file.name,
            task.error.as_deref().unwrap_or("unknown error"),
        ),
        status => println!(
            "{} {} {} (retry {})",
            progress_bar(task.progress, 20),
            task.file.name,
            status,
            task.retries,
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?.with_env_overrides();
    init_logging(&config.log.level)?;
    tracing::info!("using api at {}", config.api.base_url);

    let api = Arc::new(HttpUploadApi::new(&config.api)?);

    if let Some(note) = &cli.note {
        api.save_area_text(&cli.order, &cli.area, note).await?;
        tracing::info!("note saved for area {}", cli.area);
    }

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        files.push(read_payload(path).await?);
    }

    let queue = UploadQueue::builder()
        .config(config.queue.clone())
        .api(api)
        .build()?;
    let _subscription = queue.subscribe(print_task);

    let started = Instant::now();
    let ids = queue.enqueue_many(&cli.order, &cli.area, files);
    queue.wait_idle().await;

    let stats = queue.stats();
    println!(
        "{} of {} uploaded in {}",
        stats.completed,
        ids.len(),
        format_duration(started.elapsed())
    );

    if stats.failed > 0 {
        bail!("{} upload(s) failed", stats.failed);
    }
    Ok(())
}
