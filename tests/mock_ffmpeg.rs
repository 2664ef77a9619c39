//! A scriptable fake `ffmpeg`/`ffprobe` binary, driven entirely by
//! environment variables. Built as a `harness = false` test target so it
//! compiles to a standalone executable the driver's tests can point
//! `ffmpeg_path`/`ffprobe_path` at, the same shape as
//! `ffui_mock_ffmpeg.rs`.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();

    if let Ok(capture_path) = env::var("PLEX_BIF_MOCK_CAPTURE_ARGV_PATH") {
        let path = PathBuf::from(capture_path);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::write(&path, argv.join("\n"));
    }

    let is_ffprobe_query = argv
        .windows(2)
        .any(|w| w[0] == "-show_entries" && w[1].contains("color_transfer"));

    if is_ffprobe_query {
        if let Ok(transfer) = env::var("PLEX_BIF_MOCK_COLOR_TRANSFER") {
            println!("{transfer}");
        }
        std::process::exit(0);
    }

    if let Ok(stderr) = env::var("PLEX_BIF_MOCK_STDERR") {
        for line in stderr.split("\\n") {
            eprintln!("{line}");
        }
    }

    let is_fast_probe = argv.iter().any(|a| a == "-xerror");
    let uses_skip_frame = argv.windows(2).any(|w| w[0] == "-skip_frame:v" && w[1] == "nokey");
    let has_hwaccel = argv.iter().any(|a| a == "-hwaccel");

    // A real run using skip-frame can be scripted separately from the
    // plain retry run, and a hwaccel run separately from a non-hwaccel run,
    // so a single test can script a GPU lane and a CPU lane independently
    // even though both invoke the same mock binary.
    let (exit_var, count_var) = if is_fast_probe {
        ("PLEX_BIF_MOCK_PROBE_EXIT_CODE".to_string(), String::new())
    } else {
        let hw = if has_hwaccel { "_HW" } else { "" };
        if uses_skip_frame {
            (
                format!("PLEX_BIF_MOCK_SKIP{hw}_EXIT_CODE"),
                format!("PLEX_BIF_MOCK_SKIP{hw}_IMAGE_COUNT"),
            )
        } else {
            (
                format!("PLEX_BIF_MOCK{hw}_EXIT_CODE"),
                format!("PLEX_BIF_MOCK{hw}_IMAGE_COUNT"),
            )
        }
    };

    if let Some(output_template) = argv.iter().rev().find(|arg| arg.contains("img-%06d")) {
        let count: u32 = env::var(&count_var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if let Some(dir) = PathBuf::from(output_template).parent() {
            let _ = fs::create_dir_all(dir);
            for n in 1..=count {
                let name = format!("img-{n:06}.jpg");
                let _ = fs::write(dir.join(name), [0xFF, 0xD8, 0xFF]);
            }
        }
    }

    let exit_code: i32 = env::var(&exit_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    std::process::exit(exit_code);
}
