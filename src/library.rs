//! Library Iterator (`spec.md` §4.H).
//!
//! A thin layer over the out-of-scope Plex client: streams items and drops
//! episodes whose file locations overlap one already seen. Movies are
//! never deduped.

use std::collections::HashSet;

use crate::domain::{Item, MediaKind};

/// One record as reported by the Plex collaborator, before bundle-hash
/// resolution. `locations` is every file path Plex associates with this
/// media part (multi-part episodes report more than one).
#[derive(Debug, Clone)]
pub struct LibraryRecord {
    pub item_key: String,
    pub title: String,
    pub kind: MediaKind,
    pub locations: Vec<String>,
    pub bundle_hash: String,
}

/// The out-of-scope Plex client contract (`spec.md` §1, §6): return
/// `(item_key, locations, title, kind)` tuples and resolve
/// `item_key → bundle_hash + source file path`. Anything that can stream
/// [`LibraryRecord`]s qualifies; a real implementation talks to the Plex
/// API, a test implementation can scan a directory or hold a fixed list.
pub trait PlexCollaborator {
    fn records(&self) -> Vec<LibraryRecord>;
}

/// Drains `collaborator`, deduping multi-file episodes by overlapping
/// location set, and returns the surviving records as resolved [`Item`]s.
pub fn iterate(collaborator: &dyn PlexCollaborator) -> Vec<Item> {
    let mut seen_locations: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    for record in collaborator.records() {
        if record.kind == MediaKind::Episode {
            let overlaps = record
                .locations
                .iter()
                .any(|location| seen_locations.contains(location));
            if overlaps {
                continue;
            }
            seen_locations.extend(record.locations.iter().cloned());
        }

        let Some(source_file) = record.locations.first() else {
            continue;
        };

        items.push(Item {
            key: record.item_key,
            title: record.title,
            kind: record.kind,
            source_file: source_file.into(),
            bundle_hash: record.bundle_hash,
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCollaborator(Vec<LibraryRecord>);

    impl PlexCollaborator for FixedCollaborator {
        fn records(&self) -> Vec<LibraryRecord> {
            self.0.clone()
        }
    }

    fn episode(key: &str, locations: &[&str]) -> LibraryRecord {
        LibraryRecord {
            item_key: key.into(),
            title: format!("Episode {key}"),
            kind: MediaKind::Episode,
            locations: locations.iter().map(|s| s.to_string()).collect(),
            bundle_hash: "a".repeat(40),
        }
    }

    #[test]
    fn overlapping_episode_locations_are_deduped_keeping_the_first() {
        let collaborator = FixedCollaborator(vec![
            episode("keyA", &["/x.mkv", "/y.mkv"]),
            episode("keyB", &["/y.mkv", "/z.mkv"]),
        ]);

        let items = iterate(&collaborator);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "keyA");
    }

    #[test]
    fn movies_are_never_deduped_even_with_shared_locations() {
        let collaborator = FixedCollaborator(vec![
            LibraryRecord {
                item_key: "m1".into(),
                title: "Movie 1".into(),
                kind: MediaKind::Movie,
                locations: vec!["/m.mkv".to_string()],
                bundle_hash: "a".repeat(40),
            },
            LibraryRecord {
                item_key: "m2".into(),
                title: "Movie 2".into(),
                kind: MediaKind::Movie,
                locations: vec!["/m.mkv".to_string()],
                bundle_hash: "b".repeat(40),
            },
        ]);

        let items = iterate(&collaborator);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn non_overlapping_episodes_are_both_kept() {
        let collaborator = FixedCollaborator(vec![
            episode("keyA", &["/x.mkv"]),
            episode("keyB", &["/z.mkv"]),
        ]);

        let items = iterate(&collaborator);
        assert_eq!(items.len(), 2);
    }
}
