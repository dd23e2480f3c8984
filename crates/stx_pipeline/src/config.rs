//! Run configuration.

use crate::error::ConfigError;
use crate::exclusion::FilenamePatternRule;
use crate::model::{AssetLayout, TargetMapping};
use camino::{Utf8Path, Utf8PathBuf};

/// Everything a pipeline run needs besides the mod stack and collaborators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Outputs mirror canonical asset paths under this directory.
    pub output_root: Utf8PathBuf,
    pub targets: TargetMapping,
    /// Glob patterns matched against the canonical path.
    pub excluded_filenames: Vec<String>,
    /// Substrings matched against the directory of the canonical path.
    pub excluded_paths: Vec<String>,
    /// Skip assets whose output already exists, and allow a non-empty output root.
    pub resume: bool,
    /// Write `main.log`, `exclusions.log` and `errors.log` to the output root.
    pub audit_logging: bool,
    /// Upper bound on concurrently running tasks.
    pub max_in_flight: usize,
    pub layout: AssetLayout,
}

impl PipelineConfig {
    pub fn new(output_root: impl Into<Utf8PathBuf>, targets: TargetMapping) -> Self {
        Self {
            output_root: output_root.into(),
            targets,
            excluded_filenames: Vec::new(),
            excluded_paths: Vec::new(),
            resume: false,
            audit_logging: true,
            max_in_flight: default_max_in_flight(),
            layout: AssetLayout::default(),
        }
    }

    pub fn with_excluded_filenames<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_filenames = patterns
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn with_excluded_paths<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_paths = substrings
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_audit_logging(mut self, enabled: bool) -> Self {
        self.audit_logging = enabled;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_layout(mut self, layout: AssetLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Filename patterns that actually apply.
    ///
    /// A pattern of the form `*<suffix>` is dropped when `<suffix>` is a target:
    /// targeting a texture type overrides excluding it.
    pub fn effective_filename_patterns(&self) -> Vec<String> {
        self.excluded_filenames
            .iter()
            .filter(|pattern| {
                !self
                    .targets
                    .iter()
                    .any(|(suffix, _)| pattern.strip_prefix('*') == Some(suffix))
            })
            .cloned()
            .collect()
    }

    /// Check everything that can be checked before touching any mod.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if let Some((suffix, _)) = self.targets.iter().find(|(_, dim)| *dim == 0) {
            return Err(ConfigError::ZeroTarget(suffix.to_string()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        FilenamePatternRule::new(self.effective_filename_patterns())?;
        check_output_root(&self.output_root, self.resume)
    }
}

fn check_output_root(output_root: &Utf8Path, resume: bool) -> Result<(), ConfigError> {
    if !output_root.exists() {
        return Ok(());
    }
    if !output_root.is_dir() {
        return Err(ConfigError::OutputNotADirectory(output_root.to_path_buf()));
    }

    let non_empty = std::fs::read_dir(output_root)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if non_empty && !resume {
        return Err(ConfigError::OutputNotEmpty(output_root.to_path_buf()));
    }
    Ok(())
}

fn default_max_in_flight() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
