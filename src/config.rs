//! External configuration (`spec.md` §6: "handed in, not parsed here",
//! the core treats this as an opaque struct; this module only owns the
//! serde shape and the load/save mechanics, grounded on
//! `ffui_core::settings::io`'s read/write-JSON-atomically pattern).

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::GpuVendor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedGpuConfig {
    pub vendor: GpuVendorConfig,
    pub device_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendorConfig {
    Nvidia,
    Amd,
    Intel,
    WindowsGpu,
    Apple,
}

impl From<GpuVendorConfig> for GpuVendor {
    fn from(value: GpuVendorConfig) -> Self {
        match value {
            GpuVendorConfig::Nvidia => GpuVendor::Nvidia,
            GpuVendorConfig::Amd => GpuVendor::Amd,
            GpuVendorConfig::Intel => GpuVendor::Intel,
            GpuVendorConfig::WindowsGpu => GpuVendor::WindowsGpu,
            GpuVendorConfig::Apple => GpuVendor::Apple,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMap {
    pub plex_prefix: String,
    pub local_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub frame_interval_seconds: u32,
    pub thumbnail_quality: u32,
    pub regenerate: bool,
    pub plex_config: PathBuf,
    pub plex_path_map: Option<PathMap>,
    pub working_tmp: PathBuf,
    pub gpu_workers: usize,
    pub cpu_workers: usize,
    pub selected_gpus: Vec<SelectedGpuConfig>,
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval_seconds: 5,
            thumbnail_quality: 4,
            regenerate: false,
            plex_config: PathBuf::new(),
            plex_path_map: None,
            working_tmp: std::env::temp_dir(),
            gpu_workers: 0,
            cpu_workers: 1,
            selected_gpus: Vec::new(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_json_file(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_file(path, self)
    }
}

fn read_json_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("failed to parse JSON from {}", path.display()))
}

fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file = File::create(&tmp_path)
        .with_context(|| format!("failed to create temp file {}", tmp_path.display()))?;
    serde_json::to_writer_pretty(&file, value)
        .with_context(|| format!("failed to write JSON to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to atomically rename {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = EngineConfig::default();
        config.gpu_workers = 2;
        config.cpu_workers = 4;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.gpu_workers, 2);
        assert_eq!(loaded.cpu_workers, 4);
    }

    #[test]
    fn missing_ffprobe_path_defaults_to_bare_binary_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "frame_interval_seconds": 5,
                "thumbnail_quality": 4,
                "regenerate": false,
                "plex_config": "/plex",
                "plex_path_map": null,
                "working_tmp": "/tmp",
                "gpu_workers": 0,
                "cpu_workers": 1,
                "selected_gpus": [],
                "ffmpeg_path": "ffmpeg"
            }"#,
        )
        .unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.ffprobe_path, PathBuf::from("ffprobe"));
    }
}
