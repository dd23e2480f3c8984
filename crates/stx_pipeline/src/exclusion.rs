//! Exclusion rules.
//!
//! A candidate runs through an [`ExclusionChain`] in order; the first rule that
//! returns a reason decides, and later rules are not consulted. The resolution
//! floor needs probed dimensions, so the pipeline evaluates it separately once
//! headers have been read.

use crate::error::ConfigError;
use crate::model::{AssetCandidate, Dimensions, TargetMapping};
use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use std::fmt;

/// Why a candidate was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Resume mode found an output from a previous run.
    AlreadyExists,
    FilenamePattern(String),
    PathSubstring(String),
    /// No target suffix matches the path.
    NotTargeted,
    TooSmall { dimensions: Dimensions, target: u32 },
    /// The header probe failed.
    Unreadable(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::AlreadyExists => write!(f, "Already exists"),
            ExclusionReason::FilenamePattern(pattern) => write!(f, "Matches {}", pattern),
            ExclusionReason::PathSubstring(substring) => write!(f, "Matches {}", substring),
            ExclusionReason::NotTargeted => write!(f, "Not targeted"),
            ExclusionReason::TooSmall { dimensions, target } => {
                write!(f, "Too small ({} <= {})", dimensions, target)
            }
            ExclusionReason::Unreadable(message) => write!(f, "Unreadable header: {}", message),
        }
    }
}

/// One step of the chain.
pub trait ExclusionRule: Send + Sync {
    fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason>;
}

/// Ordered, short-circuiting list of rules.
#[derive(Default)]
pub struct ExclusionChain {
    rules: Vec<Box<dyn ExclusionRule>>,
}

impl ExclusionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl ExclusionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason> {
        self.rules.iter().find_map(|rule| rule.evaluate(candidate))
    }
}

/// Skips assets whose output already exists under the output root.
pub struct ResumeRule {
    output_root: Utf8PathBuf,
}

impl ResumeRule {
    pub fn new(output_root: impl AsRef<Utf8Path>) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }
}

impl ExclusionRule for ResumeRule {
    fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason> {
        self.output_root
            .join(candidate.canonical_path())
            .is_file()
            .then_some(ExclusionReason::AlreadyExists)
    }
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Glob patterns matched against the whole canonical path. `*` crosses `/`.
pub struct FilenamePatternRule {
    patterns: Vec<(String, Pattern)>,
}

impl FilenamePatternRule {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let pattern = p.as_ref().to_lowercase();
                Pattern::new(&pattern)
                    .map(|compiled| (pattern.clone(), compiled))
                    .map_err(|source| ConfigError::InvalidPattern { pattern, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl ExclusionRule for FilenamePatternRule {
    fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason> {
        self.patterns
            .iter()
            .find(|(_, compiled)| compiled.matches_with(candidate.canonical_path(), GLOB_OPTIONS))
            .map(|(pattern, _)| ExclusionReason::FilenamePattern(pattern.clone()))
    }
}

/// Substrings matched against the directory part of the canonical path,
/// which always starts with `/` (so `/interface` only hits a whole segment
/// start).
pub struct PathSubstringRule {
    substrings: Vec<String>,
}

impl PathSubstringRule {
    pub fn new<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            substrings: substrings
                .into_iter()
                .map(|s| s.as_ref().replace('\\', "/").to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl ExclusionRule for PathSubstringRule {
    fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason> {
        let directory = candidate.directory();
        self.substrings
            .iter()
            .find(|s| directory.contains(s.as_str()))
            .map(|s| ExclusionReason::PathSubstring(s.clone()))
    }
}

/// Excludes paths that no target suffix applies to.
pub struct TargetRule {
    targets: TargetMapping,
}

impl TargetRule {
    pub fn new(targets: TargetMapping) -> Self {
        Self { targets }
    }
}

impl ExclusionRule for TargetRule {
    fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason> {
        match self.targets.lookup(candidate.canonical_path()) {
            Some(_) => None,
            None => Some(ExclusionReason::NotTargeted),
        }
    }
}

/// Excludes assets whose shorter edge is already at or below their target.
///
/// Passes candidates that have not been probed yet.
pub struct ResolutionFloorRule {
    targets: TargetMapping,
}

impl ResolutionFloorRule {
    pub fn new(targets: TargetMapping) -> Self {
        Self { targets }
    }
}

impl ExclusionRule for ResolutionFloorRule {
    fn evaluate(&self, candidate: &AssetCandidate) -> Option<ExclusionReason> {
        let dimensions = candidate.dimensions()?;
        let (_, target) = self.targets.lookup(candidate.canonical_path())?;
        (dimensions.shorter_edge() <= target)
            .then_some(ExclusionReason::TooSmall { dimensions, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Origin;
    use crate::test_support::utf8_tempdir;
    use std::sync::Arc;
    use stx_mod_core::Mod;

    fn candidate(path: &str) -> AssetCandidate {
        AssetCandidate::new(
            path,
            Origin::LooseFile(Utf8PathBuf::from("/mods/m").join(path)),
            Arc::new(Mod::new("m", "/mods/m")),
        )
    }

    fn probed(path: &str, width: u32, height: u32) -> AssetCandidate {
        let mut c = candidate(path);
        c.record_dimensions(Dimensions::new(width, height));
        c
    }

    #[test]
    fn test_filename_pattern_crosses_separators() {
        let rule = FilenamePatternRule::new(["*_N.dds", "*/lod/*"]).unwrap();

        assert_eq!(
            rule.evaluate(&candidate("textures/armor/iron_n.dds")),
            Some(ExclusionReason::FilenamePattern("*_n.dds".to_string()))
        );
        assert_eq!(
            rule.evaluate(&candidate("textures/terrain/lod/a.dds")),
            Some(ExclusionReason::FilenamePattern("*/lod/*".to_string()))
        );
        assert_eq!(rule.evaluate(&candidate("textures/armor/iron_d.dds")), None);
    }

    #[test]
    fn test_filename_pattern_invalid() {
        let result = FilenamePatternRule::new(["textures/[oops"]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_path_substring_uses_directory_only() {
        let rule = PathSubstringRule::new(["/Interface", "\\effects"]);

        let reason = rule.evaluate(&candidate("textures/interface/y_d.dds")).unwrap();
        assert_eq!(reason.to_string(), "Matches /interface");
        assert!(rule.evaluate(&candidate("textures/effects/fx.dds")).is_some());
        // Only the file name contains the substring.
        assert!(rule.evaluate(&candidate("textures/armor/interface.dds")).is_none());
        // Not the start of a segment.
        assert!(rule.evaluate(&candidate("textures/userinterface/x.dds")).is_none());
    }

    #[test]
    fn test_target_rule() {
        let rule = TargetRule::new(TargetMapping::new().with_target("_d.dds", 512));
        assert!(rule.evaluate(&candidate("textures/a_d.dds")).is_none());
        assert_eq!(
            rule.evaluate(&candidate("textures/a_n.dds")),
            Some(ExclusionReason::NotTargeted)
        );
    }

    #[test]
    fn test_resolution_floor() {
        let rule = ResolutionFloorRule::new(TargetMapping::new().with_target("_d.dds", 512));

        let reason = rule.evaluate(&probed("textures/a_d.dds", 400, 400)).unwrap();
        assert_eq!(reason.to_string(), "Too small (400x400 <= 512)");
        assert!(rule.evaluate(&probed("textures/a_d.dds", 512, 2048)).is_some());
        assert!(rule.evaluate(&probed("textures/a_d.dds", 513, 2048)).is_none());
        assert!(rule.evaluate(&candidate("textures/a_d.dds")).is_none());
    }

    #[test]
    fn test_resume_rule() {
        let (_dir, root) = utf8_tempdir();
        std::fs::create_dir_all(root.join("textures")).unwrap();
        std::fs::write(root.join("textures/done_d.dds"), b"x").unwrap();

        let rule = ResumeRule::new(&root);
        assert_eq!(
            rule.evaluate(&candidate("textures/done_d.dds")),
            Some(ExclusionReason::AlreadyExists)
        );
        assert!(rule.evaluate(&candidate("textures/todo_d.dds")).is_none());
    }

    #[test]
    fn test_chain_short_circuits_in_order() {
        let chain = ExclusionChain::new()
            .with_rule(PathSubstringRule::new(["/interface"]))
            .with_rule(TargetRule::new(TargetMapping::new().with_target("_d.dds", 512)));

        assert_eq!(chain.len(), 2);
        // Both rules would fire; the first one decides.
        assert_eq!(
            chain.evaluate(&candidate("textures/interface/y_n.dds")),
            Some(ExclusionReason::PathSubstring("/interface".to_string()))
        );
        assert_eq!(
            chain.evaluate(&candidate("textures/armor/y_n.dds")),
            Some(ExclusionReason::NotTargeted)
        );
        assert_eq!(chain.evaluate(&candidate("textures/armor/y_d.dds")), None);
        assert_eq!(ExclusionChain::new().evaluate(&candidate("textures/a.dds")), None);
    }
}
