//! Run record persistence.
//!
//! After each run a [`RunState`] is written to `.skytex-run.json` in the
//! output root. A resumed run loads it and compares it with the current mod
//! stack and targets. A mismatch is only reported: outputs that already exist
//! are kept at the resolution they were built with.

use crate::error::Result;
use crate::model::TargetMapping;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// File name of the run record inside the output root.
pub const RUN_STATE_FILE: &str = ".skytex-run.json";

const RUN_STATE_VERSION: u32 = 1;

/// Snapshot of the inputs of a run.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "mods": ["Base Textures", "Armor Retex"],
///   "targets": [{ "suffix": "_n.dds", "resolution": 1024 }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub version: u32,

    /// Mod names in load order.
    pub mods: Vec<String>,

    /// Target suffixes in lookup order.
    pub targets: Vec<RunTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTarget {
    pub suffix: String,
    pub resolution: u32,
}

impl RunState {
    pub fn new(mods: Vec<String>, targets: &TargetMapping) -> Self {
        Self {
            version: RUN_STATE_VERSION,
            mods,
            targets: targets
                .iter()
                .map(|(suffix, resolution)| RunTarget {
                    suffix: suffix.to_string(),
                    resolution,
                })
                .collect(),
        }
    }

    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let state: Self = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    /// Same version, same mods in the same order, same targets.
    pub fn matches(&self, other: &RunState) -> bool {
        self == other
    }
}
