//! HDR format detection via `ffprobe`, used to pick the FFmpeg Driver's
//! filter graph (`spec.md` §4.B). Grounded on
//! `ffui_core::ffprobe::ffprobe_format_duration_seconds`'s shape: spawn a
//! narrow `ffprobe` query, take the first stdout line, tolerate failure.

use std::path::Path;
use std::process::Command;

/// Returns `Some(format)` when ffprobe reports a video color-transfer
/// characteristic that is neither missing nor the literal string `"None"`
/// (the original implementation's own quirk: some probes return that as a
/// string rather than an absent field).
pub fn probe_hdr_format(ffprobe_path: &Path, source: &Path) -> Option<String> {
    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=color_transfer",
            "-of",
            "default=nw=1:nk=1",
        ])
        .arg(source)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let value = text.lines().next()?.trim();

    if value.is_empty() || value.eq_ignore_ascii_case("none") || value == "unknown" {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_reports_no_hdr_without_panicking() {
        assert_eq!(
            probe_hdr_format(
                Path::new("/no/such/ffprobe"),
                Path::new("/no/such/video.mkv")
            ),
            None
        );
    }
}
