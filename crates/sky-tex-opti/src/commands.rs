use crate::errors::CliError;
use camino::Utf8PathBuf;
use stx_mod_core::{is_valid_profile_dir, Mo2Profile, Mod, ModListFile, ModSource};

mod mods;
mod optimize;

pub use mods::list_mods;
pub use optimize::{optimize_textures, OptimizeArgs};

/// Where the mod stack comes from.
#[derive(Debug, Clone, clap::Args)]
pub struct ModSourceArgs {
    /// Mod Organizer 2 profile directory (the one containing modlist.txt)
    #[arg(short, long, conflicts_with = "mod_list")]
    pub profile: Option<Utf8PathBuf>,

    /// Text file listing mod directories in load order, one per line
    #[arg(short, long)]
    pub mod_list: Option<Utf8PathBuf>,

    /// Leave the MO2 overwrite directory out of the stack
    #[arg(long)]
    pub no_overwrite: bool,
}

impl ModSourceArgs {
    /// Mods in load order, lowest priority first.
    pub fn load_mods(&self) -> Result<Vec<Mod>, CliError> {
        let mods = match (&self.profile, &self.mod_list) {
            (Some(profile), _) => {
                if !is_valid_profile_dir(profile) {
                    return Err(CliError::InvalidProfile {
                        path: profile.to_string(),
                    });
                }
                Mo2Profile::new(profile)
                    .with_overwrite(!self.no_overwrite)
                    .ordered_mods()?
            }
            (None, Some(list)) => ModListFile::new(list).ordered_mods()?,
            (None, None) => return Err(CliError::ModSourceMissing),
        };

        tracing::debug!("Resolved {} mods", mods.len());
        Ok(mods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    fn source(profile: Option<Utf8PathBuf>, mod_list: Option<Utf8PathBuf>) -> ModSourceArgs {
        ModSourceArgs {
            profile,
            mod_list,
            no_overwrite: false,
        }
    }

    #[test]
    fn test_missing_source() {
        assert!(matches!(
            source(None, None).load_mods(),
            Err(CliError::ModSourceMissing)
        ));
    }

    #[test]
    fn test_invalid_profile() {
        let (_dir, root) = utf8_tempdir();
        assert!(matches!(
            source(Some(root), None).load_mods(),
            Err(CliError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn test_profile_stack() {
        let (_dir, root) = utf8_tempdir();
        let profile = root.join("profiles").join("Default");
        fs::create_dir_all(&profile).unwrap();
        fs::create_dir_all(root.join("mods").join("Low")).unwrap();
        fs::create_dir_all(root.join("mods").join("High")).unwrap();
        fs::create_dir_all(root.join("overwrite")).unwrap();
        fs::write(profile.join("modlist.txt"), "+High\n-Disabled\n+Low\n").unwrap();

        let mods = source(Some(profile.clone()), None).load_mods().unwrap();
        let names: Vec<_> = mods.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Low", "High", "Overwrite"]);

        let without_overwrite = ModSourceArgs {
            no_overwrite: true,
            ..source(Some(profile), None)
        };
        assert_eq!(without_overwrite.load_mods().unwrap().len(), 2);
    }

    #[test]
    fn test_mod_list_stack() {
        let (_dir, root) = utf8_tempdir();
        let a = root.join("a");
        fs::create_dir_all(&a).unwrap();
        let list = root.join("mods.txt");
        fs::write(&list, format!("{}\n", a)).unwrap();

        let mods = source(None, Some(list)).load_mods().unwrap();
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].name(), "a");

        let missing = root.join("missing.txt");
        assert!(matches!(
            source(None, Some(missing)).load_mods(),
            Err(CliError::ModSource { .. })
        ));
    }
}
