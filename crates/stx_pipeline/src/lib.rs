//! Texture optimization pipeline for a stack of game mods.
//!
//! Given mods in load order, this crate finds every texture they contribute
//! (loose files and archive entries), keeps the version from the
//! highest-priority mod, drops what the exclusion rules reject, and downscales
//! the rest concurrently into an output directory that mirrors the game's
//! data layout. Every decision is recorded in an audit log.
//!
//! - **Priority resolution**: mods are scanned from highest to lowest priority
//!   and the first claim on a path wins
//! - **Exclusion chain**: resume, filename globs, path substrings, targets and
//!   a resolution floor, short-circuiting in that order
//! - **Bounded concurrency**: header probes and resizes run on a worker pool,
//!   grouped so each archive container is opened once per stage
//! - **Failure isolation**: one broken asset never affects another
//!
//! # Example
//!
//! ```no_run
//! use stx_mod_core::{Mo2Profile, ModSource};
//! use stx_pipeline::{PipelineBuilder, PipelineConfig, TargetMapping};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mods = Mo2Profile::new("C:/MO2/profiles/Default").ordered_mods()?;
//!
//! let targets = TargetMapping::new()
//!     .with_target("_n.dds", 1024)
//!     .with_target(".dds", 2048);
//! let config = PipelineConfig::new("C:/MO2/mods/Optimized Textures", targets)
//!     .with_excluded_paths(["/interface", "/lod"]);
//!
//! let report = PipelineBuilder::new(config)
//!     .with_progress(|progress| {
//!         println!("{:?}: {}/{}", progress.stage, progress.current, progress.total);
//!     })
//!     .run(&mods)?;
//! println!("Resized {} textures, {} failed", report.resized, report.failed);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod audit;
pub mod builder;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod fanout;
pub mod locator;
pub mod model;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod resize;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types
pub use archive::{
    ArchiveContainer, ArchiveReader, ArchiveReaders, AssetStream, BsaArchiveReader,
    ZipArchiveReader,
};
pub use audit::{AuditLog, FileAuditLog, MemoryAuditLog, NoopAuditLog};
pub use builder::{PipelineBuilder, PipelineProgress, PipelineReport, PipelineStage};
pub use config::PipelineConfig;
pub use error::{ConfigError, Error, Result};
pub use exclusion::{ExclusionChain, ExclusionReason, ExclusionRule};
pub use model::{AssetCandidate, AssetLayout, Dimensions, Origin, TargetMapping};
pub use probe::{DdsHeaderProber, HeaderProber};
pub use resize::{DdsResizer, Resizer};
pub use state::RunState;
