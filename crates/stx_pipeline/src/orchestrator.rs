//! Concurrent resize of the working set.

use crate::archive::{ArchiveReader, AssetStream};
use crate::audit::AuditLog;
use crate::error::{ResizeError, TaskError};
use crate::fanout::FanOut;
use crate::model::{AssetCandidate, Dimensions, TargetMapping};
use crate::resize::Resizer;
use camino::Utf8Path;
use rayon::ThreadPool;

/// Lifecycle of a [`ResizeOrchestrator`]. It only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FanOut,
    Joining,
    Done,
}

/// What one successful resize produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOutcome {
    pub source: Dimensions,
    pub written: Dimensions,
    pub scale: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeSummary {
    pub resized: usize,
    pub failed: usize,
    /// Tasks that settled; always equals the working-set size after a run.
    pub settled: usize,
}

/// Per-task progress: `(settled so far, total, asset)`.
pub type ResizeProgress<'a> = &'a (dyn Fn(usize, usize, &AssetCandidate) + Sync);

/// Drives one resize per working-set asset and records each outcome in the
/// audit log.
pub struct ResizeOrchestrator<'a> {
    pool: &'a ThreadPool,
    archives: &'a dyn ArchiveReader,
    resizer: &'a dyn Resizer,
    audit: &'a dyn AuditLog,
    targets: &'a TargetMapping,
    output_root: &'a Utf8Path,
    progress: Option<ResizeProgress<'a>>,
    phase: Phase,
}

impl<'a> ResizeOrchestrator<'a> {
    pub fn new(
        pool: &'a ThreadPool,
        archives: &'a dyn ArchiveReader,
        resizer: &'a dyn Resizer,
        audit: &'a dyn AuditLog,
        targets: &'a TargetMapping,
        output_root: &'a Utf8Path,
    ) -> Self {
        Self {
            pool,
            archives,
            resizer,
            audit,
            targets,
            output_root,
            progress: None,
            phase: Phase::Idle,
        }
    }

    pub fn with_progress(mut self, progress: ResizeProgress<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Resize every asset and wait for all of them.
    ///
    /// Every asset must carry probed dimensions and match a target. An
    /// orchestrator runs once; later calls do nothing.
    pub fn run(&mut self, working_set: Vec<AssetCandidate>) -> ResizeSummary {
        if self.phase != Phase::Idle {
            tracing::warn!("Resize orchestrator already ran (phase {:?})", self.phase);
            return ResizeSummary::default();
        }

        let total = working_set.len();
        tracing::info!("Resizing {} assets", total);

        let Self {
            pool,
            archives,
            resizer,
            audit,
            targets,
            output_root,
            progress,
            phase,
        } = self;
        let (resizer, audit, targets, output_root) = (*resizer, *audit, *targets, *output_root);
        let progress = *progress;

        *phase = Phase::FanOut;

        let task = |asset: &AssetCandidate, mut stream: AssetStream| {
            resize_one(resizer, targets, output_root, asset, &mut stream)
        };

        let on_settled = |current: usize,
                          asset: &AssetCandidate,
                          outcome: &Result<Result<ResizeOutcome, ResizeError>, TaskError>| {
            match outcome {
                Ok(Ok(done)) => {
                    tracing::debug!("Resized {} ({} -> {})", asset, done.source, done.written);
                    audit.general(
                        &format!("Resized {} -> {} (x{:.3})", done.source, done.written, done.scale),
                        asset,
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!("Failed to resize {}: {}", asset, e);
                    audit.error(&format!("Failed to resize {}: {}", asset, e));
                }
                Err(e) => {
                    tracing::error!("Failed to resize {}: {}", asset, e);
                    audit.error(&format!("Failed to resize {}: {}", asset, e));
                }
            }
            if let Some(progress) = progress {
                progress(current, total, asset);
            }
        };

        let settled = FanOut::new(*pool, *archives).run(working_set, task, on_settled, || {
            *phase = Phase::Joining;
        });

        let mut summary = ResizeSummary {
            settled: settled.len(),
            ..Default::default()
        };
        for result in &settled {
            match result.outcome {
                Ok(Ok(_)) => summary.resized += 1,
                _ => summary.failed += 1,
            }
        }

        *phase = Phase::Done;
        tracing::info!(
            "Resize finished: {} resized, {} failed",
            summary.resized,
            summary.failed
        );
        summary
    }
}

fn resize_one(
    resizer: &dyn Resizer,
    targets: &TargetMapping,
    output_root: &Utf8Path,
    asset: &AssetCandidate,
    stream: &mut AssetStream,
) -> Result<ResizeOutcome, ResizeError> {
    let source = asset.dimensions().ok_or(ResizeError::NotProbed)?;
    let (_, target) = targets
        .lookup(asset.canonical_path())
        .ok_or(ResizeError::NotTargeted)?;

    let output = output_root.join(asset.canonical_path());
    let written = resizer.resize(stream, source, target, &output)?;

    Ok(ResizeOutcome {
        source,
        written,
        scale: target as f64 / source.shorter_edge() as f64,
    })
}
