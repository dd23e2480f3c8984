use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};

/// One layer of the mod stack.
///
/// Priority is not stored on the mod itself; it is implied by the position of
/// the mod in the list returned by a [`ModSource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mod {
    name: String,
    root: Utf8PathBuf,
}

impl Mod {
    pub fn new(name: impl Into<String>, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Display name, as shown by the mod manager.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the mod's data files.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

/// Supplies the ordered mod stack.
///
/// Implementations return mods in load order: index 0 is the lowest priority,
/// the last mod overrides every earlier one for the same asset path.
pub trait ModSource {
    fn ordered_mods(&self) -> Result<Vec<Mod>>;
}
