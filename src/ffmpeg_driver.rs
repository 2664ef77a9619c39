//! FFmpeg Driver (`spec.md` §4.B).
//!
//! Spawns FFmpeg, tails its stderr log file at a fixed poll interval, feeds
//! every new line through the Progress Parser, and classifies the outcome:
//! plain success, `codec-unsupported`, or a generic ffmpeg error. Log-file
//! tailing via `Seek`/`read_to_end` mirrors
//! `ffui_core::tools::probe_fast`'s fingerprint-by-reopen approach, adapted
//! here to an append-only file instead of a whole-file fingerprint.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::domain::{Accel, ProgressSnapshot};
use crate::error::ProcessError;
use crate::hdr;
use crate::progress;

static LOG_COUNTER: AtomicU64 = AtomicU64::new(0);

const POLL_INTERVAL: Duration = Duration::from_millis(5); // ~200 Hz
const CODEC_UNSUPPORTED_EXIT_CODES: [i32; 3] = [-22, 234, 69];
const CODEC_UNSUPPORTED_PATTERNS: [&str; 11] = [
    "no decoder for",
    "unknown decoder",
    "decoder not found",
    "could not find codec",
    "unsupported codec id",
    "hardware decoder not found",
    "hardware decoder unavailable",
    "hwaccel decoder not found",
    "hwaccel decoder unavailable",
    "unsupported codec",
    "codec not supported",
];

#[derive(Debug)]
pub struct GenerateReport {
    pub success: bool,
    pub image_count: usize,
    pub hw_used: bool,
    pub elapsed_s: f64,
    pub reported_speed: Option<String>,
}

pub struct FfmpegDriver {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl FfmpegDriver {
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    pub fn generate(
        &self,
        source_file: &Path,
        out_dir: &Path,
        accel: &Accel,
        frame_interval_seconds: u32,
        thumbnail_quality: u32,
        mut progress_cb: impl FnMut(ProgressSnapshot),
    ) -> Result<GenerateReport, ProcessError> {
        let started = Instant::now();
        let hdr_format = hdr::probe_hdr_format(&self.ffprobe_path, source_file);
        let filter = build_filter_graph(frame_interval_seconds, hdr_format.as_deref());

        let allow_skip_frame = self.fast_probe(source_file);

        let mut attempt = self.run_once(
            source_file,
            out_dir,
            accel,
            thumbnail_quality,
            &filter,
            allow_skip_frame,
            &mut progress_cb,
        )?;

        if allow_skip_frame && !attempt.status_success {
            clear_partial_jpegs(out_dir)?;
            attempt = self.run_once(
                source_file,
                out_dir,
                accel,
                thumbnail_quality,
                &filter,
                false,
                &mut progress_cb,
            )?;
        }

        let image_count = count_jpegs(out_dir)?;

        if accel.is_hardware() && image_count == 0 && is_codec_unsupported(&attempt) {
            return Err(ProcessError::CodecUnsupported(attempt.stderr_tail));
        }

        if !attempt.status_success {
            return Err(ProcessError::FfmpegError(attempt.stderr_tail));
        }

        // A clean exit with zero images is not this driver's problem to
        // classify; the Item Processor treats that as `no-frames`.
        if image_count > 0 {
            rename_frames(out_dir, frame_interval_seconds)?;
        }

        Ok(GenerateReport {
            success: true,
            image_count,
            hw_used: accel.is_hardware(),
            elapsed_s: started.elapsed().as_secs_f64(),
            reported_speed: attempt.last_speed,
        })
    }

    /// Runs a short, throwaway probe with `-skip_frame:v nokey` to see
    /// whether the source tolerates skipping non-key frames. Any spawn
    /// failure is treated as "not safe". No acceleration flags here; the
    /// probe only needs to exercise software decode of the first few frames.
    fn fast_probe(&self, source_file: &Path) -> bool {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-hide_banner", "-nostats", "-v", "error"])
            .args(["-xerror", "-err_detect", "explode"])
            .args(["-skip_frame:v", "nokey", "-threads:v", "1", "-i"])
            .arg(source_file)
            .args(["-an", "-sn", "-dn"])
            .args(["-frames:v", "10", "-f", "null"])
            .arg(null_sink())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        matches!(cmd.status(), Ok(status) if status.success())
    }

    fn run_once(
        &self,
        source_file: &Path,
        out_dir: &Path,
        accel: &Accel,
        thumbnail_quality: u32,
        filter: &str,
        use_skip_frame: bool,
        progress_cb: &mut impl FnMut(ProgressSnapshot),
    ) -> Result<RunAttempt, ProcessError> {
        fs::create_dir_all(out_dir)?;
        let log_path = unique_log_path(out_dir);

        let log_file = File::create(&log_path)?;
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-loglevel")
            .arg("info")
            .arg("-threads:v")
            .arg("1");
        push_accel_flags(&mut cmd, accel);
        if use_skip_frame {
            cmd.args(["-skip_frame:v", "nokey"]);
        }
        cmd.arg("-i")
            .arg(source_file)
            .args(["-an", "-sn", "-dn", "-q:v", &thumbnail_quality.to_string()])
            .arg("-vf")
            .arg(filter)
            .arg(out_dir.join("img-%06d.jpg"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log_file);

        let mut child = cmd.spawn()?;
        let mut reader = LogTailer::new(&log_path)?;
        let mut total_duration_s = 0.0;
        let mut last_speed = None;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                for line in reader.drain()? {
                    feed_line(&line, &mut total_duration_s, &mut last_speed, progress_cb);
                }
                break status;
            }
            for line in reader.drain()? {
                feed_line(&line, &mut total_duration_s, &mut last_speed, progress_cb);
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stderr_tail = fs::read_to_string(&log_path).unwrap_or_default();

        Ok(RunAttempt {
            status_success: status.success(),
            exit_code: status.code(),
            stderr_tail,
            last_speed,
        })
    }
}

struct RunAttempt {
    status_success: bool,
    exit_code: Option<i32>,
    stderr_tail: String,
    last_speed: Option<String>,
}

fn feed_line(
    line: &str,
    total_duration_s: &mut f64,
    last_speed: &mut Option<String>,
    progress_cb: &mut impl FnMut(ProgressSnapshot),
) {
    let (total, update) = progress::parse_line(line, *total_duration_s);
    *total_duration_s = total;
    if let Some(update) = update {
        if !update.snapshot.speed.is_empty() {
            *last_speed = Some(update.snapshot.speed.clone());
        }
        progress_cb(update.snapshot);
    }
}

struct LogTailer {
    file: File,
    offset: u64,
    leftover: String,
}

impl LogTailer {
    fn new(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            offset: 0,
            leftover: String::new(),
        })
    }

    /// Reads everything appended since the last call and returns complete
    /// lines; a trailing partial line is buffered until it is completed.
    fn drain(&mut self) -> std::io::Result<Vec<String>> {
        self.file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = String::new();
        let n = self.file.read_to_string(&mut chunk)?;
        self.offset += n as u64;

        self.leftover.push_str(&chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.leftover.find('\n') {
            let line = self.leftover[..idx].trim_end_matches('\r').to_string();
            lines.push(line);
            self.leftover.drain(..=idx);
        }
        Ok(lines)
    }
}

fn unique_log_path(out_dir: &Path) -> PathBuf {
    let pid = std::process::id();
    let counter = LOG_COUNTER.fetch_add(1, Ordering::Relaxed);
    out_dir.join(format!(".ffmpeg-{pid}-{counter}.log"))
}

fn null_sink() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

fn push_accel_flags(cmd: &mut Command, accel: &Accel) {
    match accel {
        Accel::None => {}
        Accel::Cuda => {
            cmd.args(["-hwaccel", "cuda"]);
        }
        Accel::D3d11va => {
            cmd.args(["-hwaccel", "d3d11va"]);
        }
        Accel::Videotoolbox => {
            cmd.args(["-hwaccel", "videotoolbox"]);
        }
        Accel::Vaapi(device) => {
            cmd.args(["-hwaccel", "vaapi", "-vaapi_device"]).arg(device);
        }
    }
}

/// `F = 1 / frame_interval_seconds`, rounded to 6 decimals, per `spec.md`
/// §4.B.
fn build_filter_graph(frame_interval_seconds: u32, hdr_format: Option<&str>) -> String {
    let fps = (1.0 / frame_interval_seconds as f64 * 1_000_000.0).round() / 1_000_000.0;
    let scale = format!(
        "fps=fps={fps}:round=up,scale=w=320:h=240:force_original_aspect_ratio=decrease"
    );

    match hdr_format {
        Some(_) => format!(
            "zscale=t=linear:npl=100,format=gbrpf32le,zscale=p=bt709,\
tonemap=tonemap=hable:desat=0,zscale=t=bt709:m=bt709:r=tv,format=yuv420p,{scale}"
        ),
        None => scale,
    }
}

fn is_codec_unsupported(attempt: &RunAttempt) -> bool {
    if let Some(code) = attempt.exit_code {
        if CODEC_UNSUPPORTED_EXIT_CODES.contains(&code) {
            return true;
        }
    }
    let lower = attempt.stderr_tail.to_lowercase();
    CODEC_UNSUPPORTED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

fn count_jpegs(dir: &Path) -> std::io::Result<usize> {
    Ok(fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == "jpg")
        })
        .count())
}

fn clear_partial_jpegs(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "jpg") {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Renames FFmpeg's `img-NNNNNN.jpg` sequence to the `TTTTTTTTTT.jpg`
/// timestamp names `spec.md` §3 requires, where `T = (N-1) * interval`.
fn rename_frames(dir: &Path, frame_interval_seconds: u32) -> std::io::Result<()> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("img-") && name.ends_with(".jpg"))
        })
        .collect();
    frames.sort();

    for (index, frame) in frames.iter().enumerate() {
        let timestamp = index as u64 * frame_interval_seconds as u64;
        let new_name = format!("{timestamp:010}.jpg");
        fs::rename(frame, dir.join(new_name))?;
    }
    Ok(())
}
