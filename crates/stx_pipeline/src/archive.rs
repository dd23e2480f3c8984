//! Archive container access.
//!
//! The pipeline never parses container formats itself. It asks an
//! [`ArchiveReader`] whether a file is a container, opens it once per group of
//! assets, and then pulls one independent stream per entry out of the opened
//! [`ArchiveContainer`]. Streams are owned by the task that reads them and are
//! closed when that task drops them.

use crate::error::ArchiveError;
use ba2::prelude::*;
use ba2::tes4::{self, FileCompressionOptions};
use camino::Utf8Path;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::sync::{Arc, Mutex};
use zip::ZipArchive;

/// Largest entry a container will hand out. Declared sizes come straight from
/// the container's index and are not trusted for allocation.
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 512 * 1024 * 1024;

/// Upper bound on the buffer reserved up front for one entry.
const PREALLOCATE_LIMIT: u64 = 16 * 1024 * 1024;

/// A readable byte stream owned by exactly one task.
pub type AssetStream = Box<dyn Read + Send>;

/// Recognises and opens archive containers.
pub trait ArchiveReader: Send + Sync {
    /// Whether the file at `path` should be treated as a container.
    fn is_container(&self, path: &Utf8Path) -> bool;

    /// Open and index a container. The result is shared by every task that
    /// reads an entry from it.
    fn open(&self, path: &Utf8Path) -> Result<Arc<dyn ArchiveContainer>, ArchiveError>;
}

/// An opened, indexed container.
pub trait ArchiveContainer: Send + Sync {
    /// Entry paths exactly as stored in the container.
    fn entry_names(&self) -> Vec<String>;

    /// Open an independent stream over one entry.
    fn open_entry(&self, entry: &str) -> Result<AssetStream, ArchiveError>;
}

/// Normalized, lowercase extensions without the leading dot.
fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn has_extension(path: &Utf8Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| *e == ext)
        })
        .unwrap_or(false)
}

/// Read at most `limit` bytes of `reader`; more than that is an error.
fn read_bounded(
    entry: &str,
    declared: u64,
    limit: u64,
    reader: &mut dyn Read,
) -> Result<Vec<u8>, ArchiveError> {
    let too_large = || ArchiveError::EntryTooLarge {
        entry: entry.to_string(),
        limit,
    };
    if declared > limit {
        return Err(too_large());
    }

    let mut bytes = Vec::with_capacity(declared.min(PREALLOCATE_LIMIT) as usize);
    reader.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(bytes)
}

/// Dispatches to the first reader that recognises a file.
///
/// The default set reads Skyrim `.bsa` archives and `.zip` files.
pub struct ArchiveReaders {
    readers: Vec<Box<dyn ArchiveReader>>,
}

impl Default for ArchiveReaders {
    fn default() -> Self {
        Self::new()
            .with_reader(BsaArchiveReader::default())
            .with_reader(ZipArchiveReader::default())
    }
}

impl ArchiveReaders {
    /// An empty set that recognises nothing.
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    pub fn with_reader(mut self, reader: impl ArchiveReader + 'static) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    fn reader_for(&self, path: &Utf8Path) -> Option<&dyn ArchiveReader> {
        self.readers
            .iter()
            .find(|reader| reader.is_container(path))
            .map(|reader| reader.as_ref())
    }
}

impl ArchiveReader for ArchiveReaders {
    fn is_container(&self, path: &Utf8Path) -> bool {
        self.reader_for(path).is_some()
    }

    fn open(&self, path: &Utf8Path) -> Result<Arc<dyn ArchiveContainer>, ArchiveError> {
        match self.reader_for(path) {
            Some(reader) => reader.open(path),
            None => Err(ArchiveError::Unsupported(path.to_path_buf())),
        }
    }
}

/// Skyrim Special Edition / Legendary Edition `.bsa` archives.
#[derive(Debug, Clone)]
pub struct BsaArchiveReader {
    extensions: Vec<String>,
    max_entry_bytes: u64,
}

impl Default for BsaArchiveReader {
    fn default() -> Self {
        Self::new(["bsa"])
    }
}

impl BsaArchiveReader {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: normalize_extensions(extensions),
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }

    pub fn with_max_entry_bytes(mut self, limit: u64) -> Self {
        self.max_entry_bytes = limit;
        self
    }
}

impl ArchiveReader for BsaArchiveReader {
    fn is_container(&self, path: &Utf8Path) -> bool {
        has_extension(path, &self.extensions)
    }

    fn open(&self, path: &Utf8Path) -> Result<Arc<dyn ArchiveContainer>, ArchiveError> {
        let (archive, meta) = tes4::Archive::read(path.as_std_path())?;
        let options: FileCompressionOptions = meta.into();

        let mut entries = HashMap::new();
        let mut names = Vec::new();
        for (directory_key, directory) in archive.iter() {
            let directory_name = String::from_utf8_lossy(directory_key.name()).into_owned();
            for (file_key, _) in directory.iter() {
                let file_name = String::from_utf8_lossy(file_key.name()).into_owned();
                let name = if directory_name.is_empty() || directory_name == "." {
                    file_name
                } else {
                    format!("{}\\{}", directory_name, file_name)
                };
                names.push(name.clone());
                entries.insert(name, (directory_key.clone(), file_key.clone()));
            }
        }

        Ok(Arc::new(BsaContainer {
            archive: Mutex::new(archive),
            options,
            entries,
            names,
            max_entry_bytes: self.max_entry_bytes,
        }))
    }
}

/// Directory and file records are indexed once; file data stays memory
/// mapped until an entry is opened.
struct BsaContainer {
    archive: Mutex<tes4::Archive<'static>>,
    options: FileCompressionOptions,
    entries: HashMap<String, (tes4::ArchiveKey<'static>, tes4::DirectoryKey<'static>)>,
    names: Vec<String>,
    max_entry_bytes: u64,
}

impl ArchiveContainer for BsaContainer {
    fn entry_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn open_entry(&self, entry: &str) -> Result<AssetStream, ArchiveError> {
        let not_found = || ArchiveError::EntryNotFound(entry.to_string());
        let (directory_key, file_key) = self.entries.get(entry).ok_or_else(not_found)?;

        let archive = self.archive.lock().map_err(|_| ArchiveError::Poisoned)?;
        let file = archive
            .get(directory_key)
            .and_then(|directory| directory.get(file_key))
            .ok_or_else(not_found)?;

        // Compressed entries only know their packed length up front.
        let declared = file.len() as u64;
        if declared > self.max_entry_bytes {
            return Err(ArchiveError::EntryTooLarge {
                entry: entry.to_string(),
                limit: self.max_entry_bytes,
            });
        }

        let mut bytes = Vec::new();
        file.write(&mut bytes, &self.options)?;
        if bytes.len() as u64 > self.max_entry_bytes {
            return Err(ArchiveError::EntryTooLarge {
                entry: entry.to_string(),
                limit: self.max_entry_bytes,
            });
        }
        Ok(Box::new(Cursor::new(bytes)))
    }
}

/// ZIP-backed containers.
///
/// Files are recognised by extension (case-insensitive, default `zip`).
#[derive(Debug, Clone)]
pub struct ZipArchiveReader {
    extensions: Vec<String>,
    max_entry_bytes: u64,
}

impl Default for ZipArchiveReader {
    fn default() -> Self {
        Self::new(["zip"])
    }
}

impl ZipArchiveReader {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: normalize_extensions(extensions),
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }

    pub fn with_max_entry_bytes(mut self, limit: u64) -> Self {
        self.max_entry_bytes = limit;
        self
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn is_container(&self, path: &Utf8Path) -> bool {
        has_extension(path, &self.extensions)
    }

    fn open(&self, path: &Utf8Path) -> Result<Arc<dyn ArchiveContainer>, ArchiveError> {
        let file = File::open(path.as_std_path())?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        let names = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();

        Ok(Arc::new(ZipContainer {
            archive: Mutex::new(archive),
            names,
            max_entry_bytes: self.max_entry_bytes,
        }))
    }
}

/// Central directory is parsed once; entries are decompressed on demand into
/// memory so each task gets a stream it can read without holding the lock.
struct ZipContainer {
    archive: Mutex<ZipArchive<BufReader<File>>>,
    names: Vec<String>,
    max_entry_bytes: u64,
}

impl ArchiveContainer for ZipContainer {
    fn entry_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn open_entry(&self, entry: &str) -> Result<AssetStream, ArchiveError> {
        let mut archive = self.archive.lock().map_err(|_| ArchiveError::Poisoned)?;
        let mut file = archive.by_name(entry).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => ArchiveError::EntryNotFound(entry.to_string()),
            other => ArchiveError::Zip(other),
        })?;

        let declared = file.size();
        let bytes = read_bounded(entry, declared, self.max_entry_bytes, &mut file)?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}
