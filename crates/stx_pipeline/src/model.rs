//! Asset records flowing through the pipeline.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::Arc;
use stx_mod_core::Mod;

/// Width and height of a texture, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The shorter edge, which drives every resize decision.
    pub fn shorter_edge(&self) -> u32 {
        self.width.min(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where the bytes of a candidate live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A file on disk, by absolute path.
    LooseFile(Utf8PathBuf),
    /// An entry inside an archive container.
    ArchiveEntry {
        container: Utf8PathBuf,
        entry: String,
    },
}

impl Origin {
    pub fn container(&self) -> Option<&Utf8Path> {
        match self {
            Origin::LooseFile(_) => None,
            Origin::ArchiveEntry { container, .. } => Some(container),
        }
    }
}

/// Which files count as assets at all.
///
/// Canonical paths must start with `prefix` and end with `extension`; anything
/// else is dropped before it reaches the dedup registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    prefix: String,
    extension: String,
}

impl Default for AssetLayout {
    fn default() -> Self {
        Self::new("textures/", ".dds")
    }
}

impl AssetLayout {
    pub fn new(prefix: impl AsRef<str>, extension: impl AsRef<str>) -> Self {
        Self {
            prefix: canonicalize(prefix.as_ref()),
            extension: extension.as_ref().to_lowercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn accepts(&self, canonical_path: &str) -> bool {
        canonical_path.starts_with(&self.prefix) && canonical_path.ends_with(&self.extension)
    }

    /// Cheap pre-filter used by the directory walk.
    pub fn has_extension(&self, file_name: &str) -> bool {
        file_name.to_lowercase().ends_with(&self.extension)
    }
}

/// Lowercase a path and normalize separators to `/`, without a leading slash.
pub fn canonicalize(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches('/')
        .to_lowercase()
}

/// One version of an asset, as contributed by one mod.
#[derive(Debug, Clone)]
pub struct AssetCandidate {
    canonical_path: String,
    origin: Origin,
    owning_mod: Arc<Mod>,
    dimensions: Option<Dimensions>,
}

impl AssetCandidate {
    pub fn new(canonical_path: impl AsRef<str>, origin: Origin, owning_mod: Arc<Mod>) -> Self {
        Self {
            canonical_path: canonicalize(canonical_path.as_ref()),
            origin,
            owning_mod,
            dimensions: None,
        }
    }

    pub fn canonical_path(&self) -> &str {
        &self.canonical_path
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn owning_mod(&self) -> &Mod {
        &self.owning_mod
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Record the probed dimensions. Returns `false` if they were already set;
    /// the first probe result is kept.
    pub fn record_dimensions(&mut self, dimensions: Dimensions) -> bool {
        if self.dimensions.is_some() {
            return false;
        }
        self.dimensions = Some(dimensions);
        true
    }

    /// Directory part of the canonical path, with a leading `/`.
    pub fn directory(&self) -> String {
        match self.canonical_path.rfind('/') {
            Some(idx) => format!("/{}", &self.canonical_path[..idx]),
            None => "/".to_string(),
        }
    }
}

impl fmt::Display for AssetCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.owning_mod.name(), self.canonical_path)
    }
}

/// Ordered `suffix -> max dimension` rules. The first suffix the path ends with wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetMapping {
    targets: Vec<(String, u32)>,
}

impl TargetMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. A suffix that is already present keeps its first position
    /// but takes the new dimension.
    pub fn with_target(mut self, suffix: impl AsRef<str>, max_dimension: u32) -> Self {
        self.insert(suffix, max_dimension);
        self
    }

    pub fn insert(&mut self, suffix: impl AsRef<str>, max_dimension: u32) {
        let suffix = suffix.as_ref().to_lowercase();
        match self.targets.iter_mut().find(|(s, _)| *s == suffix) {
            Some(existing) => existing.1 = max_dimension,
            None => self.targets.push((suffix, max_dimension)),
        }
    }

    pub fn lookup(&self, canonical_path: &str) -> Option<(&str, u32)> {
        self.targets
            .iter()
            .find(|(suffix, _)| canonical_path.ends_with(suffix.as_str()))
            .map(|(suffix, dim)| (suffix.as_str(), *dim))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.targets.iter().map(|(s, d)| (s.as_str(), *d))
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}
