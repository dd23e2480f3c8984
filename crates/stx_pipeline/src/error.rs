//! Error types for pipeline operations.
//!
//! Only [`ConfigError`] is fatal: it is raised before any discovery work starts.
//! Every other error describes a single mod, container or asset. Those are
//! written to the audit log where they occur and the run carries on.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    /// Settings are invalid; nothing has been touched yet.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem I/O failed outside of per-asset work (output root, run record).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize the run record.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Invalid settings or CLI combinations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The output directory already holds files and resume mode is off.
    #[error("Output directory {0} already exists and is not empty (use resume mode to continue a previous run)")]
    OutputNotEmpty(Utf8PathBuf),

    /// The output path exists but is a file.
    #[error("Output path {0} is not a directory")]
    OutputNotADirectory(Utf8PathBuf),

    /// No target suffixes are configured, so nothing could ever be resized.
    #[error("No resize targets configured")]
    NoTargets,

    /// A target maps a suffix to a zero dimension.
    #[error("Target '{0}' has a zero resolution")]
    ZeroTarget(String),

    /// A filename exclusion pattern is not a valid glob.
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// `max_in_flight` must allow at least one task.
    #[error("Concurrency limit must be at least 1")]
    ZeroConcurrency,
}

/// A mod or container could not be enumerated. Logged; the rest of the run continues.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Cannot read mod '{mod_name}' at {path}: {source}")]
    Walk {
        mod_name: String,
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Skipping non-UTF-8 path in mod '{mod_name}': {path}")]
    NonUtf8Path { mod_name: String, path: String },

    #[error("Cannot open container {container} in mod '{mod_name}': {source}")]
    Container {
        mod_name: String,
        container: Utf8PathBuf,
        #[source]
        source: ArchiveError,
    },
}

/// Archive container failures.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("BSA error: {0}")]
    Bsa(#[from] ba2::tes4::Error),

    #[error("No archive reader handles {0}")]
    Unsupported(Utf8PathBuf),

    /// Entry is larger than the configured limit, declared or actual.
    #[error("Entry '{entry}' exceeds {limit} bytes")]
    EntryTooLarge { entry: String, limit: u64 },

    #[error("Entry '{0}' not found in container")]
    EntryNotFound(String),

    /// The container lock was poisoned by a panicking reader.
    #[error("Container state poisoned")]
    Poisoned,
}

/// Malformed or truncated image header.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a DDS file (magic {0:02x?})")]
    BadMagic([u8; 4]),

    #[error("Unexpected DDS header size {0}")]
    BadHeaderSize(u32),

    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Failure while producing the resized output for one asset.
#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    /// The source is not larger than the target; resizing would upscale.
    #[error("Refusing to upscale {width}x{height} to {target}")]
    WouldUpscale { width: u32, height: u32, target: u32 },

    #[error("Source dimensions unknown (header not probed)")]
    NotProbed,

    #[error("No target applies to this path")]
    NotTargeted,
}

/// Why a per-asset stream could not be handed to its task.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Cannot open {path}: {source}")]
    Loose {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open container {container}: {source}")]
    Container {
        container: Utf8PathBuf,
        #[source]
        source: std::sync::Arc<ArchiveError>,
    },

    #[error("Cannot read entry '{entry}' from {container}: {source}")]
    Entry {
        container: Utf8PathBuf,
        entry: String,
        #[source]
        source: ArchiveError,
    },
}

/// A fan-out task that never produced a result of its own.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Task panicked: {0}")]
    Panicked(String),
}
