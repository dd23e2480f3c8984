//! Pipeline entry point.
//!
//! The [`PipelineBuilder`] wires the collaborators together and runs the whole
//! batch for one ordered mod stack.
//!
//! # Run Algorithm
//!
//! 1. Validate the [`PipelineConfig`]. Nothing is read or written before this
//!    succeeds.
//! 2. Create the output root, open the audit log and, in resume mode, compare
//!    the previous [`RunState`] with this run.
//! 3. Discovery: walk the mods from highest to lowest priority (reverse load
//!    order). Every candidate under the asset layout is offered to the
//!    [`DedupRegistry`]; the first claim for a path wins.
//! 4. Static exclusion: resume, filename patterns, path substrings and target
//!    lookup, in that order, short-circuiting.
//! 5. Probe the header of every remaining candidate on the worker pool, then
//!    apply the resolution floor. Unreadable headers are excluded and logged.
//! 6. Resize the working set through the [`ResizeOrchestrator`].
//! 7. Persist the new [`RunState`] and emit a completion progress event.

use crate::archive::{ArchiveReader, ArchiveReaders, AssetStream};
use crate::audit::{AuditLog, FileAuditLog, NoopAuditLog};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::exclusion::{
    ExclusionChain, ExclusionReason, ExclusionRule, FilenamePatternRule, PathSubstringRule,
    ResolutionFloorRule, ResumeRule, TargetRule,
};
use crate::fanout::FanOut;
use crate::locator::AssetLocator;
use crate::model::AssetCandidate;
use crate::orchestrator::ResizeOrchestrator;
use crate::probe::{DdsHeaderProber, HeaderProber};
use crate::registry::{Claim, DedupRegistry};
use crate::resize::{DdsResizer, Resizer};
use crate::state::{RunState, RUN_STATE_FILE};
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stx_mod_core::Mod;

/// Progress information emitted during a run.
///
/// `current`/`total` count mods while discovering and assets while probing and
/// resizing.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgress {
    pub stage: PipelineStage,
    /// Mod name or asset being handled, when there is one.
    pub current_item: Option<String>,
    pub current: usize,
    pub total: usize,
}

/// Stages of a run, emitted in order:
/// `Discovering` -> `Probing` -> `Resizing` -> `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    Discovering,
    Probing,
    Resizing,
    Complete,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub mods_scanned: usize,
    /// Candidates under the asset layout, across all mods.
    pub candidates: usize,
    /// Candidates dropped because a higher-priority mod claimed the path.
    pub duplicates: usize,
    pub discovery_errors: usize,
    pub excluded: usize,
    pub probe_failures: usize,
    pub resized: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

type ProgressCallback = Arc<dyn Fn(PipelineProgress) + Send + Sync>;

/// Runs discovery, dedup, exclusion and resize for one mod stack.
///
/// Create a builder with [`new`](Self::new), swap collaborators as needed,
/// optionally add [`with_progress`](Self::with_progress), then call
/// [`run`](Self::run).
pub struct PipelineBuilder {
    config: PipelineConfig,
    archives: Arc<dyn ArchiveReader>,
    prober: Arc<dyn HeaderProber>,
    resizer: Arc<dyn Resizer>,
    audit: Option<Arc<dyn AuditLog>>,
    progress_callback: Option<ProgressCallback>,
}

impl PipelineBuilder {
    /// Builder with the ZIP archive reader, DDS prober and DDS resizer.
    ///
    /// Audit events go to the log files in the output root unless
    /// [`with_audit_log`](Self::with_audit_log) supplies another sink.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            archives: Arc::new(ArchiveReaders::default()),
            prober: Arc::new(DdsHeaderProber),
            resizer: Arc::new(DdsResizer::default()),
            audit: None,
            progress_callback: None,
        }
    }

    pub fn with_archive_reader(mut self, archives: Arc<dyn ArchiveReader>) -> Self {
        self.archives = archives;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn HeaderProber>) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_resizer(mut self, resizer: Arc<dyn Resizer>) -> Self {
        self.resizer = resizer;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Register a progress callback. It is called from worker threads.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `mods`, given in load order (last mod has the highest priority).
    ///
    /// Only configuration problems and failures on the output root itself are
    /// returned as errors; per-mod and per-asset failures end up in the audit
    /// log and the report.
    pub fn run(&self, mods: &[Mod]) -> Result<PipelineReport> {
        let start_time = Instant::now();
        self.config.validate()?;

        let output_root = &self.config.output_root;
        tracing::info!("Optimizing textures...");
        tracing::info!("Output root: {}", output_root);
        tracing::info!("Mods: {}", mods.len());

        std::fs::create_dir_all(output_root.as_std_path())?;
        let audit = self.open_audit_log()?;

        let run_state = RunState::new(
            mods.iter().map(|m| m.name().to_string()).collect(),
            &self.config.targets,
        );
        let state_path = output_root.join(RUN_STATE_FILE);
        if self.config.resume {
            self.check_previous_run(&run_state, &state_path);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_in_flight)
            .thread_name(|i| format!("stx-worker-{}", i))
            .build()?;

        let mut report = PipelineReport {
            mods_scanned: mods.len(),
            ..Default::default()
        };

        let mut registry = DedupRegistry::new();
        self.discover(mods, &mut registry, audit.as_ref(), &mut report);

        let chain = self.static_rules()?;
        let mut to_probe = Vec::new();
        for candidate in registry.take_pending() {
            match chain.evaluate(&candidate) {
                Some(reason) => {
                    exclude(&mut registry, audit.as_ref(), &candidate, &reason);
                    report.excluded += 1;
                }
                None => to_probe.push(candidate),
            }
        }
        tracing::info!(
            "{} unique assets, {} excluded before probing",
            registry.len(),
            report.excluded
        );

        let working_set = self.probe(&pool, to_probe, &mut registry, audit.as_ref(), &mut report);
        tracing::info!("Working set: {} assets", working_set.len());

        let total = working_set.len();
        let on_resized = |current: usize, _: usize, asset: &AssetCandidate| {
            self.emit_progress(PipelineProgress {
                stage: PipelineStage::Resizing,
                current_item: Some(asset.canonical_path().to_string()),
                current,
                total,
            });
        };
        let summary = ResizeOrchestrator::new(
            &pool,
            self.archives.as_ref(),
            self.resizer.as_ref(),
            audit.as_ref(),
            &self.config.targets,
            output_root,
        )
        .with_progress(&on_resized)
        .run(working_set);
        report.resized = summary.resized;
        report.failed = summary.failed;

        if let Err(e) = run_state.save(&state_path) {
            tracing::warn!("Failed to save run record {}: {}", state_path, e);
        }

        report.elapsed = start_time.elapsed();
        tracing::info!(
            "Run complete in {:.2}s: {} resized, {} failed, {} excluded, {} unreadable",
            report.elapsed.as_secs_f64(),
            report.resized,
            report.failed,
            report.excluded,
            report.probe_failures
        );

        self.emit_progress(PipelineProgress {
            stage: PipelineStage::Complete,
            current_item: None,
            current: total,
            total,
        });

        Ok(report)
    }

    fn open_audit_log(&self) -> Result<Arc<dyn AuditLog>> {
        if let Some(audit) = &self.audit {
            return Ok(audit.clone());
        }
        if self.config.audit_logging {
            Ok(Arc::new(FileAuditLog::open(&self.config.output_root)?))
        } else {
            Ok(Arc::new(NoopAuditLog))
        }
    }

    fn check_previous_run(&self, current: &RunState, state_path: &camino::Utf8Path) {
        match RunState::load(state_path) {
            Ok(Some(previous)) if !previous.matches(current) => {
                tracing::warn!(
                    "Resuming with a different mod list or targets than the previous run; \
                     existing outputs keep their earlier resolution"
                );
            }
            Ok(Some(_)) => tracing::info!("Resuming previous run"),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable run record {}: {}", state_path, e),
        }
    }

    /// Walk mods from highest to lowest priority and claim paths.
    fn discover(
        &self,
        mods: &[Mod],
        registry: &mut DedupRegistry,
        audit: &dyn AuditLog,
        report: &mut PipelineReport,
    ) {
        let locator = AssetLocator::new(self.archives.as_ref(), &self.config.layout);
        let total = mods.len();

        for (position, owning_mod) in mods.iter().rev().enumerate() {
            tracing::info!("Scanning mod '{}'", owning_mod.name());
            self.emit_progress(PipelineProgress {
                stage: PipelineStage::Discovering,
                current_item: Some(owning_mod.name().to_string()),
                current: position + 1,
                total,
            });

            for item in locator.locate(Arc::new(owning_mod.clone())) {
                let candidate = match item {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        audit.error(&e.to_string());
                        report.discovery_errors += 1;
                        continue;
                    }
                };

                if !self.config.layout.accepts(candidate.canonical_path()) {
                    continue;
                }
                report.candidates += 1;

                if registry.claim_if_absent(candidate) == Claim::AlreadyTaken {
                    report.duplicates += 1;
                }
            }
        }

        tracing::info!(
            "Discovered {} candidates ({} overridden by higher-priority mods)",
            report.candidates,
            report.duplicates
        );
    }

    fn static_rules(&self) -> Result<ExclusionChain> {
        let mut chain = ExclusionChain::new();
        if self.config.resume {
            chain = chain.with_rule(ResumeRule::new(&self.config.output_root));
        }
        Ok(chain
            .with_rule(FilenamePatternRule::new(
                self.config.effective_filename_patterns(),
            )?)
            .with_rule(PathSubstringRule::new(&self.config.excluded_paths))
            .with_rule(TargetRule::new(self.config.targets.clone())))
    }

    /// Read every header on the pool and keep the assets that are large enough.
    fn probe(
        &self,
        pool: &ThreadPool,
        assets: Vec<AssetCandidate>,
        registry: &mut DedupRegistry,
        audit: &dyn AuditLog,
        report: &mut PipelineReport,
    ) -> Vec<AssetCandidate> {
        let total = assets.len();
        tracing::info!("Probing {} headers", total);

        let prober = self.prober.as_ref();
        let settled = FanOut::new(pool, self.archives.as_ref()).run(
            assets,
            |_: &AssetCandidate, mut stream: AssetStream| prober.probe(&mut stream),
            |current, asset, _| {
                self.emit_progress(PipelineProgress {
                    stage: PipelineStage::Probing,
                    current_item: Some(asset.canonical_path().to_string()),
                    current,
                    total,
                });
            },
            || {},
        );

        let floor = ResolutionFloorRule::new(self.config.targets.clone());
        let mut working_set = Vec::with_capacity(settled.len());

        for settled in settled {
            let mut asset = settled.asset;
            let failure = match settled.outcome {
                Ok(Ok(dimensions)) => {
                    asset.record_dimensions(dimensions);
                    None
                }
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(e.to_string()),
            };

            if let Some(message) = failure {
                tracing::warn!("Unable to read header of {}: {}", asset, message);
                audit.error(&format!("Unable to read header of {}: {}", asset, message));
                exclude(registry, audit, &asset, &ExclusionReason::Unreadable(message));
                report.probe_failures += 1;
                continue;
            }

            match floor.evaluate(&asset) {
                Some(reason) => {
                    exclude(registry, audit, &asset, &reason);
                    report.excluded += 1;
                }
                None => working_set.push(asset),
            }
        }

        working_set
    }

    fn emit_progress(&self, progress: PipelineProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

fn exclude(
    registry: &mut DedupRegistry,
    audit: &dyn AuditLog,
    asset: &AssetCandidate,
    reason: &ExclusionReason,
) {
    let reason = reason.to_string();
    tracing::debug!("Excluded {}: {}", asset, reason);
    audit.exclusion(&reason, asset);
    registry.mark_excluded(asset.canonical_path(), reason);
}
