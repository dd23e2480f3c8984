use crate::error::{Error, Result};
use crate::mods::{Mod, ModSource};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Mod stack read from a plain text file, one mod directory per line.
///
/// Lines are in load order (later lines override earlier ones). Blank lines and
/// lines starting with `#` are ignored. The mod name is the directory name.
#[derive(Debug, Clone)]
pub struct ModListFile {
    path: Utf8PathBuf,
}

impl ModListFile {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl ModSource for ModListFile {
    fn ordered_mods(&self) -> Result<Vec<Mod>> {
        let contents = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;

        let mods: Vec<Mod> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let root = Utf8PathBuf::from(line.trim_end_matches(['/', '\\']));
                if !root.is_dir() {
                    tracing::warn!("Listed mod directory {} does not exist", root);
                }
                let name = root.file_name().unwrap_or(root.as_str()).to_string();
                Mod::new(name, root)
            })
            .collect();
        Ok(mods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_mods_in_file_order() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let first = root.join("first");
        let second = root.join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let list = root.join("mods.txt");
        fs::write(&list, format!("# comment\n{}\n\n{}/\n", first, second)).unwrap();

        let mods = ModListFile::new(list).ordered_mods().unwrap();
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].name(), "first");
        assert_eq!(mods[1].name(), "second");
        assert_eq!(mods[1].root(), second.as_path());
    }

    #[test]
    fn test_missing_directory_is_kept() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let present = root.join("present");
        fs::create_dir_all(&present).unwrap();
        let list = root.join("mods.txt");
        fs::write(&list, format!("{}\n{}\n", root.join("nope"), present)).unwrap();

        let mods = ModListFile::new(list).ordered_mods().unwrap();
        let names: Vec<&str> = mods.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["nope", "present"]);
        assert_eq!(mods[0].root(), root.join("nope").as_path());
    }

    #[test]
    fn test_missing_list_file() {
        let result = ModListFile::new("/definitely/not/here.txt").ordered_mods();
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
