//! Path & Bundle Resolver (`spec.md` §4.G).
//!
//! Turns the file path Plex reports, a "Plex-sees"/"we-see" path remap, and
//! a bundle hash into the concrete filesystem layout under
//! `<plex_config>/Media/localhost/...` that `spec.md` §3 specifies.

use std::path::{Path, PathBuf};

use crate::domain::BundlePaths;

/// Applies the first-occurrence prefix remap used for remote generation
/// setups, then normalizes the result per-OS.
///
/// Ported from the original implementation's `sanitize_path`: on Windows,
/// forward slashes become backslashes and a UNC `//host/share` prefix
/// becomes `\\host\share`; elsewhere the path is normalized structurally
/// (no filesystem access, so symlinks are not resolved).
pub fn resolve_source_file(
    reported_path: &str,
    plex_prefix: Option<&str>,
    local_prefix: Option<&str>,
) -> PathBuf {
    let remapped = match (plex_prefix, local_prefix) {
        (Some(plex), Some(local)) if !plex.is_empty() && !local.is_empty() => {
            match reported_path.find(plex) {
                Some(idx) => {
                    let mut out = String::with_capacity(reported_path.len());
                    out.push_str(&reported_path[..idx]);
                    out.push_str(local);
                    out.push_str(&reported_path[idx + plex.len()..]);
                    out
                }
                None => reported_path.to_string(),
            }
        }
        _ => reported_path.to_string(),
    };

    PathBuf::from(normalize_path(&remapped))
}

#[cfg(windows)]
pub fn normalize_path(path: &str) -> String {
    let slashed = if let Some(rest) = path.strip_prefix("//") {
        format!("\\\\{}", rest.replace('/', "\\"))
    } else {
        path.replace('/', "\\")
    };
    normpath_lexical(&slashed, '\\')
}

#[cfg(not(windows))]
pub fn normalize_path(path: &str) -> String {
    normpath_lexical(path, '/')
}

/// Lexical `normpath`-equivalent normalization: collapses repeated
/// separators and resolves `.`/`..` components without touching the
/// filesystem.
fn normpath_lexical(path: &str, sep: char) -> String {
    let is_absolute = path.starts_with(sep);
    let unc_prefix = if sep == '\\' && path.starts_with("\\\\") {
        "\\\\"
    } else {
        ""
    };
    let body = &path[unc_prefix.len()..];

    let mut stack: Vec<&str> = Vec::new();
    for component in body.split(sep) {
        match component {
            "" | "." => continue,
            ".." => {
                if matches!(stack.last(), Some(last) if *last != "..") {
                    stack.pop();
                } else if !is_absolute {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }

    let joined = stack.join(&sep.to_string());
    match (unc_prefix.is_empty(), is_absolute, joined.is_empty()) {
        (false, _, _) => format!("{unc_prefix}{joined}"),
        (true, true, true) => sep.to_string(),
        (true, true, false) => format!("{sep}{joined}"),
        (true, false, true) => ".".to_string(),
        (true, false, false) => joined,
    }
}

/// Derives `{bundle_dir, indexes_dir, output_bif, temp_dir}` from a bundle
/// hash, per `spec.md` §3.
pub fn bundle_paths(plex_config: &Path, working_tmp: &Path, bundle_hash: &str) -> BundlePaths {
    let (first, rest) = bundle_hash.split_at(1);
    let bundle_dir = plex_config
        .join("Media")
        .join("localhost")
        .join(first)
        .join(format!("{rest}.bundle"));
    let indexes_dir = bundle_dir.join("Contents").join("Indexes");
    let output_bif = indexes_dir.join("index-sd.bif");
    let temp_dir = working_tmp.join(bundle_hash);

    BundlePaths {
        bundle_dir,
        indexes_dir,
        output_bif,
        temp_dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_replaces_first_occurrence_only() {
        let resolved = resolve_source_file(
            "/mnt/media/movies/x.mkv",
            Some("/mnt/media"),
            Some("/local"),
        );
        assert_eq!(resolved, PathBuf::from("/local/movies/x.mkv"));
    }

    #[test]
    fn remap_noop_when_either_prefix_missing() {
        let resolved = resolve_source_file("/mnt/media/x.mkv", None, None);
        assert_eq!(resolved, PathBuf::from("/mnt/media/x.mkv"));
    }

    #[test]
    fn bundle_paths_layout_matches_spec() {
        let hash = "0123456789abcdef0123456789abcdef01234567";
        let paths = bundle_paths(Path::new("/plexconf"), Path::new("/tmp/work"), hash);
        assert_eq!(
            paths.bundle_dir,
            PathBuf::from("/plexconf/Media/localhost/0/123456789abcdef0123456789abcdef01234567.bundle")
        );
        assert_eq!(
            paths.indexes_dir,
            paths.bundle_dir.join("Contents").join("Indexes")
        );
        assert_eq!(paths.output_bif, paths.indexes_dir.join("index-sd.bif"));
        assert_eq!(paths.temp_dir, PathBuf::from("/tmp/work").join(hash));
    }

    #[cfg(not(windows))]
    #[test]
    fn normalize_path_collapses_dot_segments() {
        assert_eq!(normalize_path("/a/b/../c/./d"), "/a/c/d");
    }
}
