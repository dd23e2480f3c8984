//! Mod Organizer 2 profile reading.
//!
//! An MO2 instance is laid out as:
//!
//! ```text
//! instance/
//!   mods/
//!     Some Mod/
//!       textures/...
//!   overwrite/
//!   profiles/
//!     Default/
//!       modlist.txt
//! ```
//!
//! `modlist.txt` lists the mods with the **highest** priority first. Enabled
//! mods are prefixed with `+`, disabled ones with `-`, and game-managed entries
//! (DLC, creation club) with `*`.

use crate::error::{Error, Result};
use crate::mods::{Mod, ModSource};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

const MODLIST_FILE: &str = "modlist.txt";
const SEPARATOR_SUFFIX: &str = "_separator";
const OVERWRITE_DIR: &str = "overwrite";

/// Validates that a directory looks like an MO2 profile.
pub fn is_valid_profile_dir(path: &Utf8Path) -> bool {
    path.is_dir() && path.join(MODLIST_FILE).is_file()
}

/// Resolve `<instance>/mods` from `<instance>/profiles/<profile>`.
fn mods_dir_for_profile(profile_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let instance = profile_dir.parent()?.parent()?;
    let mods = instance.join("mods");
    mods.is_dir().then_some(mods)
}

/// Parse the enabled mod names out of `modlist.txt`, highest priority first.
fn parse_modlist(contents: &str) -> Vec<&str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix('+'))
        .filter(|name| !name.ends_with(SEPARATOR_SUFFIX))
        .collect()
}

/// Mod stack read from a Mod Organizer 2 profile.
#[derive(Debug, Clone)]
pub struct Mo2Profile {
    profile_dir: Utf8PathBuf,
    include_overwrite: bool,
}

impl Mo2Profile {
    pub fn new(profile_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            include_overwrite: true,
        }
    }

    /// Whether the instance `overwrite` directory is stacked on top of all mods.
    ///
    /// MO2 always gives `overwrite` the highest priority, so this defaults to `true`.
    pub fn with_overwrite(mut self, include: bool) -> Self {
        self.include_overwrite = include;
        self
    }

    pub fn profile_dir(&self) -> &Utf8Path {
        &self.profile_dir
    }
}

impl ModSource for Mo2Profile {
    fn ordered_mods(&self) -> Result<Vec<Mod>> {
        if !is_valid_profile_dir(&self.profile_dir) {
            return Err(Error::InvalidProfile(self.profile_dir.clone()));
        }

        let mods_dir = mods_dir_for_profile(&self.profile_dir)
            .ok_or_else(|| Error::MissingModsDir(self.profile_dir.clone()))?;

        let modlist_path = self.profile_dir.join(MODLIST_FILE);
        let contents =
            fs::read_to_string(&modlist_path).map_err(|e| Error::io(&modlist_path, e))?;

        // modlist.txt is highest-priority-first; flip it into load order.
        let mut mods: Vec<Mod> = parse_modlist(&contents)
            .into_iter()
            .rev()
            .map(|name| {
                let root = mods_dir.join(name);
                if !root.is_dir() {
                    tracing::warn!("Enabled mod '{}' has no directory at {}", name, root);
                }
                Mod::new(name, root)
            })
            .collect();

        if self.include_overwrite {
            if let Some(instance) = mods_dir.parent() {
                let overwrite = instance.join(OVERWRITE_DIR);
                if overwrite.is_dir() {
                    mods.push(Mod::new("Overwrite", overwrite));
                }
            }
        }

        tracing::info!(
            "Loaded {} enabled mods from profile {}",
            mods.len(),
            self.profile_dir
        );

        Ok(mods)
    }
}
