//! LotStack CLI
//!
//! Headless driver for the staging and ingestion engine: scan a photo
//! directory to preview time clustering, ingest every stack into a local
//! SQLite catalog, and list cataloged records. All logic lives in the
//! library; this binary only wires adapters together and prints progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use lotstack::core::analysis::{
    AnalysisAdapter, MockAnalysis, OpenAIVisionAnalysis, VisionProviderConfig,
};
use lotstack::core::catalog::{RecordStore, SqliteRecordStore};
use lotstack::core::clustering::{cluster_by_time, ClusterConfig};
use lotstack::core::ingest::{IngestEvent, IngestOptions, IngestPipeline};
use lotstack::core::settings::{default_data_dir, AppSettings, SettingsManager};
use lotstack::core::staging::{Photo, Stack};
use lotstack::core::storage::LocalDiskStorage;
use lotstack::core::TimestampMs;

/// Directory depth limit when scanning for photos
const SCAN_MAX_DEPTH: usize = 4;

#[derive(Parser)]
#[command(name = "lotstack")]
#[command(about = "Photo staging and batch catalog ingestion")]
#[command(version)]
struct Cli {
    /// Application data directory (settings, assets, catalog database)
    #[arg(long, global = true, env = "LOTSTACK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and preview the proposed photo stacks
    Scan {
        /// Directory containing photos
        dir: PathBuf,

        /// Largest gap between photos in one stack, in seconds
        #[arg(long)]
        max_gap_seconds: Option<u64>,

        /// Largest number of photos per stack
        #[arg(long)]
        max_group_size: Option<usize>,
    },
    /// Cluster a directory of photos and ingest every stack into the catalog
    Ingest {
        /// Directory containing photos
        dir: PathBuf,

        /// Owner id recorded on every created catalog record
        #[arg(long)]
        owner: String,

        /// Free-text context notes passed to analysis and stored on records
        #[arg(long, default_value = "")]
        notes: String,

        /// Skip vision analysis even when a provider is configured
        #[arg(long, default_value_t = false)]
        no_analyze: bool,

        /// Largest gap between photos in one stack, in seconds
        #[arg(long)]
        max_gap_seconds: Option<u64>,

        /// Largest number of photos per stack
        #[arg(long)]
        max_group_size: Option<usize>,
    },
    /// List catalog records for an owner
    Records {
        /// Owner id to list records for
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lotstack=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let settings = SettingsManager::new(data_dir.clone()).load();

    match cli.command {
        Commands::Scan {
            dir,
            max_gap_seconds,
            max_group_size,
        } => run_scan(&dir, &settings, max_gap_seconds, max_group_size, cli.json),
        Commands::Ingest {
            dir,
            owner,
            notes,
            no_analyze,
            max_gap_seconds,
            max_group_size,
        } => {
            let args = IngestArgs {
                dir,
                owner,
                notes,
                no_analyze,
                max_gap_seconds,
                max_group_size,
            };
            run_ingest(&data_dir, &settings, args, cli.json).await
        }
        Commands::Records { owner } => run_records(&data_dir, &settings, &owner, cli.json).await,
    }
}

// =============================================================================
// Photo Discovery
// =============================================================================

fn is_photo_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "tiff" | "heic"
    )
}

/// Loads every photo under `dir` (recursively, sorted by path), using the
/// file modification time as the capture time.
fn load_photos(dir: &Path) -> Result<Vec<Photo>> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir)
        .max_depth(SCAN_MAX_DEPTH)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry during scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if is_photo_extension(ext) {
            paths.push(entry.into_path());
        }
    }
    // Sort by path so photos with identical timestamps cluster deterministically.
    paths.sort();

    let mut photos = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let taken_at = capture_time_ms(&path)
            .with_context(|| format!("failed to read metadata for {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        photos.push(Photo::new(taken_at, bytes).with_file_name(&file_name));
    }

    info!(count = photos.len(), dir = %dir.display(), "loaded photos");
    Ok(photos)
}

fn capture_time_ms(path: &Path) -> Result<TimestampMs> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("file modified before the Unix epoch")?;
    Ok(since_epoch.as_millis() as TimestampMs)
}

fn resolve_cluster_config(
    settings: &AppSettings,
    max_gap_seconds: Option<u64>,
    max_group_size: Option<usize>,
) -> ClusterConfig {
    let mut config = settings.clustering.to_cluster_config();
    if let Some(gap) = max_gap_seconds {
        config.max_gap = Duration::from_secs(gap.max(1));
    }
    if let Some(size) = max_group_size {
        config.max_group_size = size.max(1);
    }
    config
}

// =============================================================================
// Scan Command
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StackPreview {
    id: String,
    photo_count: usize,
    hero: String,
    span_seconds: f64,
    files: Vec<String>,
}

impl StackPreview {
    fn from_stack(stack: &Stack) -> Self {
        let files: Vec<String> = stack
            .photos
            .iter()
            .map(|p| p.file_name.clone().unwrap_or_else(|| p.id.clone()))
            .collect();
        let span_ms = match (stack.photos.first(), stack.photos.last()) {
            (Some(first), Some(last)) => last.taken_at_ms - first.taken_at_ms,
            _ => 0,
        };
        Self {
            id: stack.id.clone(),
            photo_count: stack.photos.len(),
            hero: files.first().cloned().unwrap_or_default(),
            span_seconds: span_ms as f64 / 1000.0,
            files,
        }
    }
}

fn run_scan(
    dir: &Path,
    settings: &AppSettings,
    max_gap_seconds: Option<u64>,
    max_group_size: Option<usize>,
    json: bool,
) -> Result<()> {
    let photos = load_photos(dir)?;
    let photo_count = photos.len();
    let config = resolve_cluster_config(settings, max_gap_seconds, max_group_size);
    let stacks = cluster_by_time(photos, &config);

    let previews: Vec<StackPreview> = stacks.iter().map(StackPreview::from_stack).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&previews)?);
        return Ok(());
    }

    if previews.is_empty() {
        println!("no photos found in {}", dir.display());
        return Ok(());
    }

    println!(
        "{} stacks from {} photos (gap {}s, max {} per stack)",
        previews.len(),
        photo_count,
        config.max_gap.as_secs(),
        config.max_group_size
    );
    for (index, preview) in previews.iter().enumerate() {
        println!(
            "  [{}] {} photos over {:.1}s, hero {}",
            index + 1,
            preview.photo_count,
            preview.span_seconds,
            preview.hero
        );
        for file in preview.files.iter().skip(1) {
            println!("        {file}");
        }
    }
    Ok(())
}

// =============================================================================
// Ingest Command
// =============================================================================

struct IngestArgs {
    dir: PathBuf,
    owner: String,
    notes: String,
    no_analyze: bool,
    max_gap_seconds: Option<u64>,
    max_group_size: Option<usize>,
}

fn build_analysis(settings: &AppSettings) -> Result<Option<Arc<dyn AnalysisAdapter>>> {
    match settings.analysis.provider.as_str() {
        "none" => Ok(None),
        "mock" => Ok(Some(Arc::new(MockAnalysis::new()))),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("analysis provider is openai but OPENAI_API_KEY is not set")?;
            let mut config = VisionProviderConfig::openai(&api_key);
            if let Some(model) = &settings.analysis.model {
                config = config.with_model(model);
            }
            if let Some(url) = &settings.analysis.base_url {
                config = config.with_base_url(url);
            }
            Ok(Some(Arc::new(OpenAIVisionAnalysis::new(config)?)))
        }
        other => bail!("unknown analysis provider in settings: {other}"),
    }
}

fn print_event(event: &IngestEvent) {
    match event {
        IngestEvent::RunStarted { total, .. } => {
            println!("ingesting {total} stacks");
        }
        IngestEvent::TaskStarted { index, total, .. } => {
            println!("[{}/{}] uploading...", index + 1, total);
        }
        IngestEvent::TaskCompleted {
            index, record_id, ..
        } => {
            println!("[{}] cataloged as {record_id}", index + 1);
        }
        IngestEvent::TaskFailed { index, error, .. } => {
            println!("[{}] failed: {error}", index + 1);
        }
        IngestEvent::RunCancelled {
            completed,
            remaining,
            ..
        } => {
            println!("cancelled after {completed} items, {remaining} left untouched");
        }
        IngestEvent::RunFinished { .. } => {}
    }
}

async fn run_ingest(
    data_dir: &Path,
    settings: &AppSettings,
    args: IngestArgs,
    json: bool,
) -> Result<()> {
    let photos = load_photos(&args.dir)?;
    if photos.is_empty() {
        bail!("no photos found in {}", args.dir.display());
    }

    let config = resolve_cluster_config(settings, args.max_gap_seconds, args.max_group_size);
    let stacks = cluster_by_time(photos, &config);

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let storage_root = settings
        .storage
        .root_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("assets"));
    let catalog_db = settings
        .storage
        .catalog_db
        .clone()
        .unwrap_or_else(|| data_dir.join("catalog.db"));

    let storage = Arc::new(LocalDiskStorage::new(storage_root));
    let records = Arc::new(SqliteRecordStore::create(&catalog_db)?);

    let analysis = if args.no_analyze {
        None
    } else {
        build_analysis(settings)?
    };

    let mut options = IngestOptions::new(&args.owner);
    if !args.notes.is_empty() {
        options = options.with_context_notes(&args.notes);
    }
    if analysis.is_none() {
        options = options.without_analysis();
    }

    let mut pipeline =
        IngestPipeline::new(storage, records).with_config(settings.ingest.to_ingest_config());
    if let Some(adapter) = analysis {
        pipeline = pipeline.with_analysis(adapter);
    }

    // Ctrl+C requests a cooperative stop between items.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping after the current item...");
            ctrl_c_cancel.cancel();
        }
    });

    let printer = if json {
        None
    } else {
        let mut events = pipeline.subscribe();
        Some(tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                print_event(&event);
            }
        }))
    };

    let run = pipeline.run_with_cancel(stacks, &options, cancel).await?;

    // Dropping the pipeline closes the event channel and ends the printer.
    drop(pipeline);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    let summary = run.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!(
            "done: {} cataloged, {} failed, {} skipped (catalog at {})",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            catalog_db.display()
        );
        for task in run.failed_tasks() {
            let reason = task.error.clone().unwrap_or_default();
            match &task.record_id {
                Some(record_id) => println!("  failed record {record_id}: {reason}"),
                None => println!("  failed before record creation: {reason}"),
            }
        }
    }

    if summary.failed > 0 {
        bail!("{} of {} stacks failed", summary.failed, summary.total);
    }
    Ok(())
}

// =============================================================================
// Records Command
// =============================================================================

async fn run_records(
    data_dir: &Path,
    settings: &AppSettings,
    owner: &str,
    json: bool,
) -> Result<()> {
    let catalog_db = settings
        .storage
        .catalog_db
        .clone()
        .unwrap_or_else(|| data_dir.join("catalog.db"));
    if !catalog_db.exists() {
        bail!("no catalog database at {}", catalog_db.display());
    }

    let store = SqliteRecordStore::create(&catalog_db)?;
    let records = store.list(owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("no records for owner {owner}");
        return Ok(());
    }
    for record in &records {
        let title = record
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| "(untitled)".to_string());
        println!(
            "{}  {:<12} {:>2} photos  {}",
            record.id,
            record.status.as_str(),
            record.assets.len(),
            title
        );
    }
    println!("{} records", records.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_extensions_are_case_insensitive() {
        assert!(is_photo_extension("jpg"));
        assert!(is_photo_extension("JPG"));
        assert!(is_photo_extension("jpeg"));
        assert!(is_photo_extension("png"));
        assert!(is_photo_extension("heic"));
        assert!(!is_photo_extension("txt"));
        assert!(!is_photo_extension("mp4"));
    }

    #[test]
    fn overrides_take_precedence_over_settings() {
        let settings = AppSettings::default();

        let config = resolve_cluster_config(&settings, Some(10), Some(6));
        assert_eq!(config.max_gap, Duration::from_secs(10));
        assert_eq!(config.max_group_size, 6);

        let config = resolve_cluster_config(&settings, None, None);
        assert_eq!(config.max_gap, Duration::from_secs(30));
        assert_eq!(config.max_group_size, 4);
    }

    #[test]
    fn cli_parses_ingest_flags() {
        let cli = Cli::try_parse_from([
            "lotstack",
            "ingest",
            "/tmp/photos",
            "--owner",
            "estate-42",
            "--notes",
            "attic lot",
            "--no-analyze",
        ])
        .unwrap();

        match cli.command {
            Commands::Ingest {
                dir,
                owner,
                notes,
                no_analyze,
                ..
            } => {
                assert_eq!(dir, PathBuf::from("/tmp/photos"));
                assert_eq!(owner, "estate-42");
                assert_eq!(notes, "attic lot");
                assert!(no_analyze);
            }
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn load_photos_skips_non_images() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"img-a").unwrap();
        std::fs::write(dir.path().join("b.png"), b"img-b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let photos = load_photos(dir.path()).unwrap();

        assert_eq!(photos.len(), 2);
        let names: Vec<&str> = photos
            .iter()
            .filter_map(|p| p.file_name.as_deref())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn load_photos_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(load_photos(&missing).is_err());
    }
}
