//! Item Processor (`spec.md` §4.C).
//!
//! Orchestrates one item end to end: resolve paths, decide whether there is
//! anything to do, run the driver into a scratch directory, pack the
//! result, and guarantee the scratch directory is gone on every exit path.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::bif;
use crate::domain::{Accel, Item, ProgressSnapshot};
use crate::error::ProcessError;
use crate::ffmpeg_driver::FfmpegDriver;
use crate::resolver;

pub struct ProcessorConfig {
    pub plex_config: std::path::PathBuf,
    pub working_tmp: std::path::PathBuf,
    pub plex_prefix: Option<String>,
    pub local_prefix: Option<String>,
    pub frame_interval_seconds: u32,
    pub thumbnail_quality: u32,
    pub regenerate: bool,
}

pub struct ItemProcessor<'a> {
    pub driver: &'a FfmpegDriver,
    pub config: &'a ProcessorConfig,
}

impl<'a> ItemProcessor<'a> {
    pub fn process(
        &self,
        item: &Item,
        accel: &Accel,
        mut progress_cb: impl FnMut(ProgressSnapshot),
    ) -> Result<(), ProcessError> {
        let source_file = resolver::resolve_source_file(
            &item.source_file.to_string_lossy(),
            self.config.plex_prefix.as_deref(),
            self.config.local_prefix.as_deref(),
        );
        let paths = resolver::bundle_paths(
            &self.config.plex_config,
            &self.config.working_tmp,
            &item.bundle_hash,
        );

        if !source_file.exists() {
            warn!(item = %item.key, path = %source_file.display(), "source file missing, skipping");
            return Err(ProcessError::MissingSource(source_file));
        }

        if paths.output_bif.exists() {
            if !self.config.regenerate {
                return Ok(());
            }
            fs::remove_file(&paths.output_bif)?;
        }

        fs::create_dir_all(&paths.indexes_dir)?;
        fs::create_dir_all(&paths.temp_dir)?;

        let result = self.run_driver_and_pack(
            item,
            accel,
            &source_file,
            &paths.temp_dir,
            &paths.output_bif,
            &mut progress_cb,
        );

        let _ = fs::remove_dir_all(&paths.temp_dir);

        result
    }

    fn run_driver_and_pack(
        &self,
        item: &Item,
        accel: &Accel,
        source_file: &Path,
        temp_dir: &Path,
        output_bif: &Path,
        progress_cb: &mut impl FnMut(ProgressSnapshot),
    ) -> Result<(), ProcessError> {
        let report = self.driver.generate(
            source_file,
            temp_dir,
            accel,
            self.config.frame_interval_seconds,
            self.config.thumbnail_quality,
            progress_cb,
        );

        let report = report?;

        if report.image_count == 0 {
            return Err(ProcessError::NoFrames);
        }

        let pack_result = bif::pack(output_bif, temp_dir, self.config.frame_interval_seconds);
        if pack_result.is_err() {
            let _ = fs::remove_file(output_bif);
        }
        pack_result.map(|_| ()).map_err(|err| {
            warn!(item = %item.key, error = %err, "bif pack failed");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaKind;
    use crate::ffmpeg_driver::FfmpegDriver;
    use tempfile::tempdir;

    fn sample_item(source: &Path) -> Item {
        Item {
            key: "k1".into(),
            title: "Movie".into(),
            kind: MediaKind::Movie,
            source_file: source.to_path_buf(),
            bundle_hash: "a".repeat(40),
        }
    }

    #[test]
    fn missing_source_is_reported_as_skip_not_failure() {
        let root = tempdir().unwrap();
        let config = ProcessorConfig {
            plex_config: root.path().join("plexconf"),
            working_tmp: root.path().join("tmp"),
            plex_prefix: None,
            local_prefix: None,
            frame_interval_seconds: 5,
            thumbnail_quality: 4,
            regenerate: false,
        };
        let driver = FfmpegDriver::new("ffmpeg".into(), "ffprobe".into());
        let processor = ItemProcessor {
            driver: &driver,
            config: &config,
        };
        let item = sample_item(&root.path().join("missing.mkv"));

        let err = processor.process(&item, &Accel::None, |_| {}).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn existing_bif_short_circuits_when_not_regenerating() {
        let root = tempdir().unwrap();
        let source = root.path().join("movie.mkv");
        fs::write(&source, b"fake").unwrap();

        let config = ProcessorConfig {
            plex_config: root.path().join("plexconf"),
            working_tmp: root.path().join("tmp"),
            plex_prefix: None,
            local_prefix: None,
            frame_interval_seconds: 5,
            thumbnail_quality: 4,
            regenerate: false,
        };
        let item = sample_item(&source);
        let paths = resolver::bundle_paths(&config.plex_config, &config.working_tmp, &item.bundle_hash);
        fs::create_dir_all(&paths.indexes_dir).unwrap();
        fs::write(&paths.output_bif, b"existing").unwrap();

        let driver = FfmpegDriver::new("ffmpeg".into(), "ffprobe".into());
        let processor = ItemProcessor {
            driver: &driver,
            config: &config,
        };

        processor.process(&item, &Accel::None, |_| {}).unwrap();
        assert_eq!(fs::read(&paths.output_bif).unwrap(), b"existing");
    }
}
