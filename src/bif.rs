//! BIF Packer (`spec.md` §4.A, binary format in §6).
//!
//! Reads every `*.jpg` in `image_dir` in ascending filename order and
//! writes the bit-exact BIF layout. Writes to a `.tmp` sibling and renames
//! into place so a reader never observes a torn file, the same
//! write-then-rename idiom `ffui_core::settings::io::write_json_file` uses
//! for config, generalized to an arbitrary binary payload.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ProcessError;

const MAGIC: [u8; 8] = [0x89, 0x42, 0x49, 0x46, 0x0D, 0x0A, 0x1A, 0x0A];
const VERSION: u32 = 0;
const HEADER_LEN: u64 = 64;
const END_MARKER: u32 = 0xFFFF_FFFF;

pub struct PackStats {
    pub image_count: usize,
    pub total_bytes: u64,
}

/// Builds `output_path` from every `*.jpg` file found in `image_dir`.
///
/// The caller must not invoke this with zero images (`spec.md` §4.A); that
/// is enforced by the Item Processor, not here, so this function has a
/// single, simple contract: pack whatever images are present.
pub fn pack(
    output_path: &Path,
    image_dir: &Path,
    frame_interval_seconds: u32,
) -> Result<PackStats, ProcessError> {
    let mut images: Vec<_> = fs::read_dir(image_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jpg"))
        .collect();
    images.sort();

    let sizes: Vec<u64> = images
        .iter()
        .map(|path| fs::metadata(path).map(|meta| meta.len()))
        .collect::<Result<_, _>>()?;

    let n = images.len() as u32;
    let table_len = 8 * (n as u64 + 1);
    let mut image_offset = HEADER_LEN + table_len;

    let tmp_path = output_path.with_extension("bif.tmp");
    if let Some(parent) = tmp_path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = fs::File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&n.to_le_bytes())?;
        writer.write_all(&(1000u32 * frame_interval_seconds).to_le_bytes())?;
        writer.write_all(&[0u8; 44])?;

        for (index, size) in sizes.iter().enumerate() {
            writer.write_all(&(index as u32).to_le_bytes())?;
            writer.write_all(&(image_offset as u32).to_le_bytes())?;
            image_offset += size;
        }
        writer.write_all(&END_MARKER.to_le_bytes())?;
        writer.write_all(&(image_offset as u32).to_le_bytes())?;

        for image in &images {
            let data = fs::read(image)?;
            writer.write_all(&data)?;
        }

        writer.flush()?;
    }

    fs::rename(&tmp_path, output_path)?;

    Ok(PackStats {
        image_count: images.len(),
        total_bytes: image_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn header_and_index_table_match_spec_example() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("0000000000.jpg"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("0000000005.jpg"), vec![0u8; 200]).unwrap();
        fs::write(dir.path().join("0000000010.jpg"), vec![0u8; 300]).unwrap();

        let out = dir.path().join("index-sd.bif");
        let stats = pack(&out, dir.path(), 5).unwrap();
        assert_eq!(stats.image_count, 3);

        let bytes = fs::read(&out).unwrap();
        assert_eq!(&bytes[0..8], &MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 0);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 5000);
        assert_eq!(&bytes[20..64], &[0u8; 44]);

        let entry = |off: usize| {
            (
                u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()),
                u32::from_le_bytes(bytes[off + 4..off + 8].try_into().unwrap()),
            )
        };
        assert_eq!(entry(64), (0, 96));
        assert_eq!(entry(72), (1, 196));
        assert_eq!(entry(80), (2, 396));
        assert_eq!(entry(88), (0xFFFF_FFFF, 696));
        assert_eq!(bytes.len(), 696);
    }

    #[test]
    fn offsets_advance_exactly_by_image_size() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("0000000000.jpg"), vec![1u8; 37]).unwrap();
        fs::write(dir.path().join("0000000002.jpg"), vec![2u8; 91]).unwrap();

        let out = dir.path().join("index-sd.bif");
        pack(&out, dir.path(), 2).unwrap();
        let bytes = fs::read(&out).unwrap();

        let off0 = u32::from_le_bytes(bytes[68..72].try_into().unwrap());
        let off1 = u32::from_le_bytes(bytes[76..80].try_into().unwrap());
        assert_eq!(off1 - off0, 37);
    }

    #[test]
    fn empty_dir_produces_zero_image_bif() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("index-sd.bif");
        let stats = pack(&out, dir.path(), 5).unwrap();
        assert_eq!(stats.image_count, 0);
        let bytes = fs::read(&out).unwrap();
        assert_eq!(bytes.len(), 72); // header(64) + end marker(8), zero entries
    }
}
