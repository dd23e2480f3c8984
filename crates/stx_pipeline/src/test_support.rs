//! Shared fixtures for unit tests.

use crate::error::ResizeError;
use crate::model::Dimensions;
use crate::resize::{scaled_dimensions, write_atomically, Resizer};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub(crate) fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

pub(crate) fn write_zip(path: &Utf8Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Writes an SSE texture archive from `(directory, file, bytes)` triples.
pub(crate) fn write_bsa(path: &Utf8Path, entries: &[(&str, &str, &[u8])]) {
    use ba2::prelude::*;
    use ba2::tes4::{
        Archive, ArchiveFlags, ArchiveKey, ArchiveOptions, ArchiveTypes, Directory, DirectoryKey,
        File, Version,
    };
    use std::collections::BTreeMap;

    let mut grouped: BTreeMap<&str, Vec<(&str, &[u8])>> = BTreeMap::new();
    for (directory, name, bytes) in entries {
        grouped.entry(*directory).or_default().push((*name, *bytes));
    }
    let archive: Archive = grouped
        .into_iter()
        .map(|(directory, files)| {
            let directory_entries: Directory = files
                .into_iter()
                .map(|(name, bytes)| (DirectoryKey::from(name), File::from_decompressed(bytes)))
                .collect();
            (ArchiveKey::from(directory), directory_entries)
        })
        .collect();

    let options = ArchiveOptions::builder()
        .types(ArchiveTypes::TEXTURES)
        .version(Version::SSE)
        .flags(ArchiveFlags::DIRECTORY_STRINGS | ArchiveFlags::FILE_STRINGS)
        .build();
    let mut file = std::fs::File::create(path).unwrap();
    archive.write(&mut file, &options).unwrap();
}

/// A bare 128-byte DDS preamble carrying only magic, size and dimensions.
pub(crate) fn dds_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; 128];
    bytes[..4].copy_from_slice(b"DDS ");
    bytes[4..8].copy_from_slice(&124u32.to_le_bytes());
    bytes[12..16].copy_from_slice(&height.to_le_bytes());
    bytes[16..20].copy_from_slice(&width.to_le_bytes());
    bytes
}

/// Header followed by a tag, so tests can tell which mod's bytes were used.
pub(crate) fn fake_dds(width: u32, height: u32, tag: &str) -> Vec<u8> {
    let mut bytes = dds_header(width, height);
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

pub(crate) fn write_loose(root: &Utf8Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Writes `"<w>x<h> <tag>"` instead of pixels.
///
/// A payload tagged `CORRUPT` fails to decode; one tagged `PANIC` panics.
#[derive(Default)]
pub(crate) struct FakeResizer {
    calls: AtomicUsize,
}

impl FakeResizer {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resizer for FakeResizer {
    fn resize(
        &self,
        stream: &mut dyn Read,
        source: Dimensions,
        target: u32,
        output: &Utf8Path,
    ) -> Result<Dimensions, ResizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let tag = String::from_utf8_lossy(bytes.get(128..).unwrap_or_default()).into_owned();
        if tag.contains("PANIC") {
            panic!("resizer exploded on {output}");
        }
        if tag.contains("CORRUPT") {
            return Err(ResizeError::Decode("corrupt pixel data".to_string()));
        }

        let (scaled, _) = scaled_dimensions(source, target).ok_or(ResizeError::WouldUpscale {
            width: source.width,
            height: source.height,
            target,
        })?;
        write_atomically(output, |w| {
            write!(w, "{} {}", scaled, tag)?;
            Ok(())
        })?;
        Ok(scaled)
    }
}
