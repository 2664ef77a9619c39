//! Core data types shared across the engine: library items, bundle paths,
//! accel selection, and the job/worker state the pool tracks.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Movie,
    Episode,
}

/// One media part the engine needs a BIF for. Produced by a
/// [`crate::library::PlexCollaborator`] implementation.
#[derive(Debug, Clone)]
pub struct Item {
    pub key: String,
    pub title: String,
    pub kind: MediaKind,
    pub source_file: PathBuf,
    pub bundle_hash: String,
}

impl Item {
    /// `bundle_hash` is the 40-char hex id Plex assigns to a media part.
    /// A malformed hash is a collaborator bug, not a panic-worthy invariant
    /// violation here, but callers should validate before trusting it for
    /// filesystem paths.
    pub fn has_valid_bundle_hash(&self) -> bool {
        self.bundle_hash.len() == 40 && self.bundle_hash.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// Hardware-acceleration mode passed to the FFmpeg driver. The driver does
/// no detection of its own; it trusts whatever the caller hands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accel {
    None,
    Cuda,
    D3d11va,
    Videotoolbox,
    Vaapi(PathBuf),
}

impl Accel {
    pub fn is_hardware(&self) -> bool {
        !matches!(self, Accel::None)
    }
}

/// A selected, working GPU lane as handed in by the (out-of-scope) GPU
/// detector. `vendor` picks the accel flavor; `device_path` is only
/// meaningful for VAAPI.
#[derive(Debug, Clone)]
pub struct SelectedGpu {
    pub vendor: GpuVendor,
    pub device_path: Option<PathBuf>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    WindowsGpu,
    Apple,
}

impl SelectedGpu {
    pub fn accel(&self) -> Accel {
        match self.vendor {
            GpuVendor::Nvidia => Accel::Cuda,
            GpuVendor::WindowsGpu => Accel::D3d11va,
            GpuVendor::Apple => Accel::Videotoolbox,
            GpuVendor::Amd | GpuVendor::Intel => match &self.device_path {
                Some(path) => Accel::Vaapi(path.clone()),
                None => Accel::None,
            },
        }
    }
}

/// Filesystem paths derived from a bundle hash. See `spec.md` §3.
#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub bundle_dir: PathBuf,
    pub indexes_dir: PathBuf,
    pub output_bif: PathBuf,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Gpu,
    Cpu,
}

/// A snapshot of one worker's state and current progress, safe to clone out
/// from under the progress lock for a UI/logging callback.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub id: usize,
    pub kind: WorkerKind,
    pub gpu_index: Option<usize>,
    pub busy: bool,
    pub current_item_key: Option<String>,
    pub progress: ProgressSnapshot,
    pub completed_count: u64,
    pub failed_count: u64,
}

/// FFmpeg progress data for the job currently running on a worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: f64,
    pub frame: u64,
    pub time_str: String,
}

/// Aggregate counters plus per-worker snapshots, published to the pool's
/// progress callback under a single lock.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total: u64,
    pub workers: Vec<WorkerSnapshot>,
}

/// Outcome of one processing attempt, as reported by a worker to the pool.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok,
    CodecUnsupported,
    Failed(String),
    Skipped(String),
}

/// Format a title for a fixed-width progress display, keeping an episode's
/// trailing `SxxEyy` tag visible even when the rest has to be truncated.
///
/// Ported from the original implementation's `format_display_title`
/// (dropped by the distilled spec, kept here as a small pure helper useful
/// to any TTY progress callback).
pub fn display_title(title: &str, kind: MediaKind, max_width: usize) -> String {
    let truncated = match kind {
        MediaKind::Episode if title.chars().count() > max_width && max_width > 9 => {
            let chars: Vec<char> = title.chars().collect();
            let tag_len = 6.min(chars.len());
            let tag: String = chars[chars.len() - tag_len..].iter().collect();
            let available = max_width.saturating_sub(tag_len + 3);
            if available > 0 {
                let head: String = chars[..chars.len() - tag_len].iter().collect();
                let head = head.trim_end();
                let head: String = head.chars().take(available).collect();
                format!("{head}...{tag}")
            } else {
                format!("...{tag}")
            }
        }
        _ if title.chars().count() > max_width && max_width > 3 => {
            let head: String = title.chars().take(max_width - 3).collect();
            format!("{head}...")
        }
        _ => title.to_string(),
    };

    if truncated.chars().count() < max_width {
        let pad = max_width - truncated.chars().count();
        format!("{truncated}{}", " ".repeat(pad))
    } else {
        truncated
    }
}
