//! CLI runner around the engine: loads config, scans a directory as a
//! stand-in Plex collaborator, builds the worker pool, and prints a final
//! summary. Logging setup follows `gl_core::telemetry::init_tracing`'s
//! env-filter-first approach, simplified to the single binary's needs.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use clap::Parser;
use plex_bif_previews::config::EngineConfig;
use plex_bif_previews::domain::{MediaKind, SelectedGpu};
use plex_bif_previews::ffmpeg_driver::FfmpegDriver;
use plex_bif_previews::library::{self, LibraryRecord, PlexCollaborator};
use plex_bif_previews::pool::Pool;
use plex_bif_previews::processor::ProcessorConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "plex-bif-previews", about = "Generate Plex BIF preview bundles")]
struct Cli {
    /// Path to a JSON config file matching `EngineConfig`.
    #[arg(long)]
    config: PathBuf,

    /// Directory to scan for video files (stand-in for a real Plex library).
    #[arg(long)]
    library: PathBuf,
}

/// Scans a directory tree for video files and reports each as a movie.
/// The bundle hash a real Plex server assigns is opaque here, so this
/// stand-in derives a deterministic 40-hex-char id from the file path;
/// it has no relation to Plex's own hashing.
struct DirectoryCollaborator {
    root: PathBuf,
}

impl PlexCollaborator for DirectoryCollaborator {
    fn records(&self) -> Vec<LibraryRecord> {
        let mut records = Vec::new();
        collect_videos(&self.root, &mut records);
        records
    }
}

fn collect_videos(dir: &Path, out: &mut Vec<LibraryRecord>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            collect_videos(&path, out);
            continue;
        }
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "mkv" | "mp4" | "m4v" | "avi"));
        if !is_video {
            continue;
        }
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        out.push(LibraryRecord {
            item_key: path.to_string_lossy().to_string(),
            title,
            kind: MediaKind::Movie,
            locations: vec![path.to_string_lossy().to_string()],
            bundle_hash: path_to_bundle_hash(&path),
        });
    }
}

fn path_to_bundle_hash(path: &Path) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path.hash(&mut hasher);
    let digest = hasher.finish();
    format!("{digest:016x}{digest:016x}{digest:08x}")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config)?;

    let selected_gpus: Vec<SelectedGpu> = config
        .selected_gpus
        .iter()
        .map(|gpu| SelectedGpu {
            vendor: gpu.vendor.into(),
            device_path: gpu.device_path.clone(),
            name: None,
        })
        .collect();

    let driver = FfmpegDriver::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
    let processor_config = ProcessorConfig {
        plex_config: config.plex_config.clone(),
        working_tmp: config.working_tmp.clone(),
        plex_prefix: config.plex_path_map.as_ref().map(|m| m.plex_prefix.clone()),
        local_prefix: config.plex_path_map.as_ref().map(|m| m.local_prefix.clone()),
        frame_interval_seconds: config.frame_interval_seconds,
        thumbnail_quality: config.thumbnail_quality,
        regenerate: config.regenerate,
    };

    let mut pool = Pool::new(
        config.gpu_workers,
        config.cpu_workers,
        &selected_gpus,
        driver,
        processor_config,
    );

    let collaborator = DirectoryCollaborator { root: cli.library };
    for item in library::iterate(&collaborator) {
        pool.enqueue(item);
    }

    pool.run_to_completion(&selected_gpus, |snapshot| {
        info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            skipped = snapshot.skipped,
            total = snapshot.total,
            "progress"
        );
    });

    let snapshot = pool.snapshot();
    info!(
        completed = snapshot.completed,
        failed = snapshot.failed,
        skipped = snapshot.skipped,
        total = snapshot.total,
        "run finished"
    );

    pool.shutdown();

    Ok(())
}
