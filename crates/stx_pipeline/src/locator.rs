//! Per-mod asset enumeration.
//!
//! [`AssetLocator::locate`] walks one mod root and lazily yields every
//! candidate it finds: loose files first, then the entries of each archive
//! container met during the walk. Loose files come first so that, inside a
//! single mod, a loose file claims its path before a packed copy can.
//!
//! Nothing but container indexes is read here; asset bytes are left alone.

use crate::archive::ArchiveReader;
use crate::error::DiscoveryError;
use crate::model::{canonicalize, AssetCandidate, AssetLayout, Origin};
use camino::Utf8PathBuf;
use std::collections::VecDeque;
use std::sync::Arc;
use stx_mod_core::Mod;
use walkdir::WalkDir;

/// Enumerates candidates for one mod at a time.
pub struct AssetLocator<'a> {
    archives: &'a dyn ArchiveReader,
    layout: &'a AssetLayout,
}

impl<'a> AssetLocator<'a> {
    pub fn new(archives: &'a dyn ArchiveReader, layout: &'a AssetLayout) -> Self {
        Self { archives, layout }
    }

    /// Start enumerating `owning_mod`. Failures are yielded as `Err` items and
    /// do not end the sequence.
    pub fn locate(&self, owning_mod: Arc<Mod>) -> Locate<'a> {
        let walker = WalkDir::new(owning_mod.root().as_std_path())
            .sort_by_file_name()
            .into_iter();

        Locate {
            owning_mod,
            archives: self.archives,
            layout: self.layout,
            walker,
            walk_done: false,
            containers: VecDeque::new(),
            pending: Vec::new().into_iter(),
        }
    }
}

/// Lazy candidate sequence for one mod. See [`AssetLocator::locate`].
pub struct Locate<'a> {
    owning_mod: Arc<Mod>,
    archives: &'a dyn ArchiveReader,
    layout: &'a AssetLayout,
    walker: walkdir::IntoIter,
    walk_done: bool,
    containers: VecDeque<Utf8PathBuf>,
    pending: std::vec::IntoIter<AssetCandidate>,
}

impl Locate<'_> {
    fn next_loose(&mut self) -> Option<Result<AssetCandidate, DiscoveryError>> {
        for entry in self.walker.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_else(|| self.owning_mod.root().to_string());
                    return Some(Err(DiscoveryError::Walk {
                        mod_name: self.owning_mod.name().to_string(),
                        path: Utf8PathBuf::from(path),
                        source,
                    }));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(p) => p,
                Err(p) => {
                    return Some(Err(DiscoveryError::NonUtf8Path {
                        mod_name: self.owning_mod.name().to_string(),
                        path: p.display().to_string(),
                    }))
                }
            };

            if self.archives.is_container(&path) {
                self.containers.push_back(path);
                continue;
            }

            let Some(file_name) = path.file_name() else {
                continue;
            };
            if !self.layout.has_extension(file_name) {
                continue;
            }

            let relative = path
                .strip_prefix(self.owning_mod.root())
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|_| path.as_str().to_string());

            return Some(Ok(AssetCandidate::new(
                relative,
                Origin::LooseFile(path),
                self.owning_mod.clone(),
            )));
        }

        self.walk_done = true;
        None
    }

    fn next_packed(&mut self) -> Option<Result<AssetCandidate, DiscoveryError>> {
        loop {
            if let Some(candidate) = self.pending.next() {
                return Some(Ok(candidate));
            }

            let container = self.containers.pop_front()?;
            let opened = match self.archives.open(&container) {
                Ok(opened) => opened,
                Err(source) => {
                    return Some(Err(DiscoveryError::Container {
                        mod_name: self.owning_mod.name().to_string(),
                        container,
                        source,
                    }))
                }
            };

            tracing::debug!(
                "Indexed container {} ({} entries) in mod '{}'",
                container,
                opened.entry_names().len(),
                self.owning_mod.name()
            );

            self.pending = opened
                .entry_names()
                .into_iter()
                .filter(|entry| self.layout.has_extension(entry))
                .map(|entry| {
                    AssetCandidate::new(
                        canonicalize(&entry),
                        Origin::ArchiveEntry {
                            container: container.clone(),
                            entry,
                        },
                        self.owning_mod.clone(),
                    )
                })
                .collect::<Vec<_>>()
                .into_iter();
        }
    }
}

impl Iterator for Locate<'_> {
    type Item = Result<AssetCandidate, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.walk_done {
            if let Some(item) = self.next_loose() {
                return Some(item);
            }
        }
        self.next_packed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveReaders, ZipArchiveReader};
    use crate::test_support::{utf8_tempdir, write_bsa, write_zip};
    use std::fs;

    fn collect(root: &camino::Utf8Path) -> Vec<Result<AssetCandidate, DiscoveryError>> {
        let reader = ZipArchiveReader::default();
        let layout = AssetLayout::default();
        let locator = AssetLocator::new(&reader, &layout);
        locator
            .locate(Arc::new(Mod::new("Test Mod", root)))
            .collect()
    }

    #[test]
    fn test_locate_loose_files_are_canonical() {
        let (_dir, root) = utf8_tempdir();
        fs::create_dir_all(root.join("Textures/Armor")).unwrap();
        fs::write(root.join("Textures/Armor/Iron_D.DDS"), b"x").unwrap();
        fs::write(root.join("Textures/Armor/readme.txt"), b"x").unwrap();

        let found: Vec<AssetCandidate> = collect(&root).into_iter().map(Result::unwrap).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].canonical_path(), "textures/armor/iron_d.dds");
        assert_eq!(
            found[0].origin(),
            &Origin::LooseFile(root.join("Textures/Armor/Iron_D.DDS"))
        );
        assert_eq!(found[0].owning_mod().name(), "Test Mod");
    }

    #[test]
    fn test_locate_archive_entries_after_loose_files() {
        let (_dir, root) = utf8_tempdir();
        write_zip(
            &root.join("Armor - Textures.zip"),
            &[
                ("Textures\\Armor\\Steel_D.dds", b"a".as_slice()),
                ("meshes/armor/steel.nif", b"b".as_slice()),
            ],
        );
        fs::create_dir_all(root.join("textures")).unwrap();
        fs::write(root.join("textures/loose.dds"), b"x").unwrap();

        let found: Vec<AssetCandidate> = collect(&root).into_iter().map(Result::unwrap).collect();
        let paths: Vec<&str> = found.iter().map(|c| c.canonical_path()).collect();
        assert_eq!(paths, vec!["textures/loose.dds", "textures/armor/steel_d.dds"]);

        match found[1].origin() {
            Origin::ArchiveEntry { container, entry } => {
                assert_eq!(container, &root.join("Armor - Textures.zip"));
                assert_eq!(entry, "Textures\\Armor\\Steel_D.dds");
            }
            other => panic!("expected archive entry, got {:?}", other),
        }
    }

    #[test]
    fn test_locate_reports_broken_container_and_continues() {
        let (_dir, root) = utf8_tempdir();
        fs::write(root.join("a_broken.zip"), b"garbage").unwrap();
        write_zip(&root.join("b_good.zip"), &[("textures/ok.dds", b"a".as_slice())]);

        let results = collect(&root);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(DiscoveryError::Container { .. })));
        assert_eq!(results[1].as_ref().unwrap().canonical_path(), "textures/ok.dds");
    }

    #[test]
    fn test_locate_missing_root_is_a_walk_error() {
        let (_dir, root) = utf8_tempdir();
        let results = collect(&root.join("does-not-exist"));
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DiscoveryError::Walk { .. })));
    }

    #[test]
    fn test_locate_bsa_entries() {
        let (_dir, root) = utf8_tempdir();
        write_bsa(
            &root.join("Armor.bsa"),
            &[
                ("textures\\armor", "steel_d.dds", b"a".as_slice()),
                ("meshes\\armor", "steel.nif", b"b".as_slice()),
            ],
        );

        let readers = ArchiveReaders::default();
        let layout = AssetLayout::default();
        let found: Vec<AssetCandidate> = AssetLocator::new(&readers, &layout)
            .locate(Arc::new(Mod::new("Test Mod", &root)))
            .map(Result::unwrap)
            .collect();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].canonical_path(), "textures/armor/steel_d.dds");
        match found[0].origin() {
            Origin::ArchiveEntry { container, .. } => {
                assert_eq!(container, &root.join("Armor.bsa"));
            }
            other => panic!("expected archive entry, got {:?}", other),
        }
    }
}
