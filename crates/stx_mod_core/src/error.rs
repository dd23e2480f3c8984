use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving the mod stack.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory is not a Mod Organizer 2 profile (no `modlist.txt`).
    #[error("Not a Mod Organizer 2 profile: {0}")]
    InvalidProfile(Utf8PathBuf),

    /// The profile is not nested as `<instance>/profiles/<name>`.
    #[error("Cannot locate the mods directory for profile {0}")]
    MissingModsDir(Utf8PathBuf),
}

impl Error {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
