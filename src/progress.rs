//! Progress Parser (`spec.md` §4.F).
//!
//! Pure, no I/O: turns one FFmpeg stderr line plus the currently-known
//! total duration into an updated duration and, for progress lines, a
//! payload for the caller's progress callback. Token-based parsing
//! (`split_whitespace` + `strip_prefix`), the same approach
//! `ffui_core::engine::ffmpeg_args::progress` uses instead of regex.

use crate::domain::ProgressSnapshot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub snapshot: ProgressSnapshot,
    pub current_s: f64,
    pub total_s: f64,
}

/// Feeds one stderr line through the parser. Returns the (possibly
/// unchanged) total duration, and, for lines that carry a `time=` field, a
/// progress payload to hand to the caller's callback.
pub fn parse_line(line: &str, total_duration_s: f64) -> (f64, Option<ProgressUpdate>) {
    if let Some(total) = parse_duration_line(line) {
        return (total, None);
    }

    if !line.contains("time=") {
        return (total_duration_s, None);
    }

    let mut frame: u64 = 0;
    let mut fps: f64 = 0.0;
    let mut size_kb: u64 = 0;
    let mut bitrate_kbps: f64 = 0.0;
    let mut speed = String::new();
    let mut current_s: Option<f64> = None;
    let mut time_str = String::new();

    for token in line.split_whitespace() {
        if let Some(rest) = token.strip_prefix("frame=") {
            frame = rest.parse().unwrap_or(0);
        } else if let Some(rest) = token.strip_prefix("fps=") {
            fps = rest.parse().unwrap_or(0.0);
        } else if let Some(rest) = token.strip_prefix("size=") {
            size_kb = rest.trim_end_matches("kB").parse().unwrap_or(0);
        } else if let Some(rest) = token.strip_prefix("bitrate=") {
            bitrate_kbps = rest.trim_end_matches("kbits/s").parse().unwrap_or(0.0);
        } else if let Some(rest) = token.strip_prefix("speed=") {
            speed = rest.trim_end_matches('x').to_string();
        } else if let Some(rest) = token.strip_prefix("time=") {
            if let Some(seconds) = parse_timecode(rest) {
                current_s = Some(seconds);
                time_str = rest.to_string();
            }
        }
    }

    let Some(current_s) = current_s else {
        return (total_duration_s, None);
    };

    let percent = if total_duration_s > 0.0 {
        (100.0 * current_s / total_duration_s).min(100.0)
    } else {
        0.0
    };
    let eta_seconds = (total_duration_s - current_s).max(0.0);

    let _ = (size_kb, bitrate_kbps); // retained for future display, unused today

    let update = ProgressUpdate {
        snapshot: ProgressSnapshot {
            percent,
            fps,
            speed,
            eta_seconds,
            frame,
            time_str,
        },
        current_s,
        total_s: total_duration_s,
    };

    (total_duration_s, Some(update))
}

fn parse_duration_line(line: &str) -> Option<f64> {
    let idx = line.find("Duration:")?;
    let rest = line[idx + "Duration:".len()..].trim();
    let token = rest.split(',').next()?.trim();
    parse_timecode(token)
}

fn parse_timecode(s: &str) -> Option<f64> {
    let mut parts = s.splitn(3, ':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let sec: f64 = parts.next()?.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + sec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_line_sets_total() {
        let (total, update) = parse_line(
            "Duration: 00:05:30.00, start: 0.000000, bitrate: 128 kb/s",
            0.0,
        );
        assert_eq!(total, 330.0);
        assert!(update.is_none());
    }

    #[test]
    fn progress_line_computes_percent_and_eta() {
        let (total, update) = parse_line(
            "frame=  150 fps= 30 q=23.0 size=    512kB time=00:00:05.00 bitrate= 837.6kbits/s speed=1.2x",
            100.0,
        );
        assert_eq!(total, 100.0);
        let update = update.expect("progress line should parse");
        assert_eq!(update.current_s, 5.0);
        assert_eq!(update.snapshot.percent, 5.0);
        assert_eq!(update.snapshot.eta_seconds, 95.0);
        assert_eq!(update.snapshot.frame, 150);
        assert_eq!(update.snapshot.speed, "1.2");
    }

    #[test]
    fn progress_before_duration_known_reports_zero_percent() {
        let (_, update) = parse_line("frame=10 fps=5 time=00:00:01.00 speed=1.0x", 0.0);
        let update = update.expect("progress line should parse");
        assert_eq!(update.snapshot.percent, 0.0);
    }

    #[test]
    fn unrecognised_line_is_ignored() {
        let (total, update) = parse_line("Stream #0:0: Video: h264", 42.0);
        assert_eq!(total, 42.0);
        assert!(update.is_none());
    }

    #[test]
    fn percent_never_exceeds_100() {
        let (_, update) = parse_line("time=00:01:00.00 speed=1.0x", 10.0);
        assert_eq!(update.unwrap().snapshot.percent, 100.0);
    }
}
