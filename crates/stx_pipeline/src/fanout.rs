//! Bounded fan-out over a set of assets.
//!
//! Assets are grouped by the container that holds them, plus one residual
//! group of loose files. Each container is opened once by a group task, which
//! then spawns one sub-task per entry; each sub-task opens its own stream from
//! the shared container handle. Loose files get one task each. All tasks run
//! on the caller's [`rayon::ThreadPool`] and the call returns only once every
//! task and sub-task has settled.
//!
//! A failure or panic in one task is reported for that asset alone.

use crate::archive::{ArchiveContainer, ArchiveReader, AssetStream};
use crate::error::{ArchiveError, StreamError, TaskError};
use crate::model::{AssetCandidate, Origin};
use camino::Utf8PathBuf;
use rayon::ThreadPool;
use std::any::Any;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// One asset after its task has finished, successfully or not.
#[derive(Debug)]
pub struct Settled<R> {
    pub asset: AssetCandidate,
    pub outcome: Result<R, TaskError>,
}

pub struct FanOut<'a> {
    pool: &'a ThreadPool,
    archives: &'a dyn ArchiveReader,
}

enum OpenFailure {
    Archive(Arc<ArchiveError>),
    Panicked(String),
}

impl<'a> FanOut<'a> {
    pub fn new(pool: &'a ThreadPool, archives: &'a dyn ArchiveReader) -> Self {
        Self { pool, archives }
    }

    /// Run `task` once per asset and return every result in input order.
    ///
    /// `on_settled` is called from the worker thread as each task finishes,
    /// with the running count of settled tasks. `on_spawned` is called once
    /// every top-level task has been queued, before joining.
    pub fn run<R, F, S, J>(
        &self,
        assets: Vec<AssetCandidate>,
        task: F,
        on_settled: S,
        on_spawned: J,
    ) -> Vec<Settled<R>>
    where
        R: Send,
        F: Fn(&AssetCandidate, AssetStream) -> R + Sync,
        S: Fn(usize, &AssetCandidate, &Result<R, TaskError>) + Sync,
        J: FnOnce() + Send,
    {
        let total = assets.len();
        let (groups, loose) = group_by_container(assets);
        tracing::debug!(
            "Fanning out {} assets: {} container groups, {} loose files",
            total,
            groups.len(),
            loose.len()
        );

        let slots: Mutex<Vec<Option<Settled<R>>>> = Mutex::new((0..total).map(|_| None).collect());
        let settled = AtomicUsize::new(0);

        let finish = |index: usize, asset: AssetCandidate, outcome: Result<R, TaskError>| {
            let current = settled.fetch_add(1, Ordering::SeqCst) + 1;
            on_settled(current, &asset, &outcome);
            let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots[index] = Some(Settled { asset, outcome });
        };

        let finish = &finish;
        let task = &task;
        let archives = self.archives;

        self.pool.scope(move |scope| {
            for (container, members) in groups {
                scope.spawn(move |scope| {
                    let opened = match panic::catch_unwind(AssertUnwindSafe(|| archives.open(&container))) {
                        Ok(Ok(handle)) => Ok(handle),
                        Ok(Err(e)) => Err(OpenFailure::Archive(Arc::new(e))),
                        Err(payload) => Err(OpenFailure::Panicked(panic_message(payload.as_ref()))),
                    };

                    let handle = match opened {
                        Ok(handle) => handle,
                        Err(failure) => {
                            tracing::warn!("Cannot open container {}", container);
                            for (index, asset) in members {
                                let error = match &failure {
                                    OpenFailure::Archive(source) => TaskError::Stream(StreamError::Container {
                                        container: container.clone(),
                                        source: source.clone(),
                                    }),
                                    OpenFailure::Panicked(message) => TaskError::Panicked(message.clone()),
                                };
                                finish(index, asset, Err(error));
                            }
                            return;
                        }
                    };

                    for (index, asset) in members {
                        let handle = handle.clone();
                        scope.spawn(move |_| {
                            let outcome = guarded(|| {
                                let stream = open_from_container(handle.as_ref(), archives, &asset)?;
                                Ok(task(&asset, stream))
                            });
                            finish(index, asset, outcome);
                        });
                    }
                });
            }

            for (index, asset) in loose {
                scope.spawn(move |_| {
                    let outcome = guarded(|| {
                        let stream = open_direct(archives, asset.origin())?;
                        Ok(task(&asset, stream))
                    });
                    finish(index, asset, outcome);
                });
            }

            on_spawned();
        });

        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect()
    }
}

type Indexed = Vec<(usize, AssetCandidate)>;

fn group_by_container(assets: Vec<AssetCandidate>) -> (BTreeMap<Utf8PathBuf, Indexed>, Indexed) {
    let mut groups: BTreeMap<Utf8PathBuf, Indexed> = BTreeMap::new();
    let mut loose = Vec::new();

    for (index, asset) in assets.into_iter().enumerate() {
        match asset.origin().container() {
            Some(container) => groups
                .entry(container.to_path_buf())
                .or_default()
                .push((index, asset)),
            None => loose.push((index, asset)),
        }
    }

    (groups, loose)
}

fn open_from_container(
    handle: &dyn ArchiveContainer,
    archives: &dyn ArchiveReader,
    asset: &AssetCandidate,
) -> Result<AssetStream, StreamError> {
    match asset.origin() {
        Origin::ArchiveEntry { container, entry } => {
            handle
                .open_entry(entry)
                .map_err(|source| StreamError::Entry {
                    container: container.clone(),
                    entry: entry.clone(),
                    source,
                })
        }
        origin => open_direct(archives, origin),
    }
}

/// Open a stream without a pre-opened container handle.
fn open_direct(archives: &dyn ArchiveReader, origin: &Origin) -> Result<AssetStream, StreamError> {
    match origin {
        Origin::LooseFile(path) => {
            let file = File::open(path).map_err(|source| StreamError::Loose {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        Origin::ArchiveEntry { container, entry } => {
            let handle = archives
                .open(container)
                .map_err(|source| StreamError::Container {
                    container: container.clone(),
                    source: Arc::new(source),
                })?;
            handle.open_entry(entry).map_err(|source| StreamError::Entry {
                container: container.clone(),
                entry: entry.clone(),
                source,
            })
        }
    }
}

fn guarded<R>(work: impl FnOnce() -> Result<R, TaskError>) -> Result<R, TaskError> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{utf8_tempdir, write_loose, write_zip};
    use crate::archive::ZipArchiveReader;
    use std::io::Read;
    use std::sync::Arc;
    use stx_mod_core::Mod;

    fn pool(threads: usize) -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap()
    }

    fn loose(root: &camino::Utf8Path, path: &str) -> AssetCandidate {
        AssetCandidate::new(
            path,
            Origin::LooseFile(root.join(path)),
            Arc::new(Mod::new("m", root)),
        )
    }

    fn packed(container: &camino::Utf8Path, entry: &str) -> AssetCandidate {
        AssetCandidate::new(
            entry,
            Origin::ArchiveEntry {
                container: container.to_path_buf(),
                entry: entry.to_string(),
            },
            Arc::new(Mod::new("m", container.parent().unwrap())),
        )
    }

    fn read_all(_: &AssetCandidate, mut stream: AssetStream) -> String {
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_results_follow_input_order() {
        let (_dir, root) = utf8_tempdir();
        write_loose(&root, "textures/a.dds", b"loose-a");
        write_zip(
            &root.join("pack.zip"),
            &[
                ("textures/b.dds", b"packed-b".as_slice()),
                ("textures/c.dds", b"packed-c".as_slice()),
            ],
        );

        let assets = vec![
            packed(&root.join("pack.zip"), "textures/b.dds"),
            loose(&root, "textures/a.dds"),
            packed(&root.join("pack.zip"), "textures/c.dds"),
        ];

        let pool = pool(3);
        let reader = ZipArchiveReader::default();
        let seen = AtomicUsize::new(0);
        let spawned = AtomicUsize::new(0);
        let settled = FanOut::new(&pool, &reader).run(
            assets,
            read_all,
            |current, _, _| {
                seen.fetch_max(current, Ordering::SeqCst);
            },
            || {
                spawned.fetch_add(1, Ordering::SeqCst);
            },
        );

        let outputs: Vec<String> = settled
            .into_iter()
            .map(|s| s.outcome.unwrap())
            .collect();
        assert_eq!(outputs, vec!["packed-b", "loose-a", "packed-c"]);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(spawned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_broken_container_fails_each_member() {
        let (_dir, root) = utf8_tempdir();
        std::fs::write(root.join("broken.zip"), b"not a zip").unwrap();
        write_loose(&root, "textures/ok.dds", b"fine");

        let assets = vec![
            packed(&root.join("broken.zip"), "textures/x.dds"),
            packed(&root.join("broken.zip"), "textures/y.dds"),
            loose(&root, "textures/ok.dds"),
        ];

        let pool = pool(2);
        let reader = ZipArchiveReader::default();
        let settled = FanOut::new(&pool, &reader).run(assets, read_all, |_, _, _| {}, || {});

        assert_eq!(settled.len(), 3);
        assert!(matches!(
            settled[0].outcome,
            Err(TaskError::Stream(StreamError::Container { .. }))
        ));
        assert!(matches!(
            settled[1].outcome,
            Err(TaskError::Stream(StreamError::Container { .. }))
        ));
        assert_eq!(settled[2].outcome.as_ref().unwrap(), "fine");
    }

    #[test]
    fn test_missing_file_and_panic_are_isolated() {
        let (_dir, root) = utf8_tempdir();
        write_loose(&root, "textures/boom.dds", b"boom");
        write_loose(&root, "textures/ok.dds", b"ok");

        let assets = vec![
            loose(&root, "textures/missing.dds"),
            loose(&root, "textures/boom.dds"),
            loose(&root, "textures/ok.dds"),
        ];

        let pool = pool(2);
        let reader = ZipArchiveReader::default();
        let counter = AtomicUsize::new(0);
        let settled = FanOut::new(&pool, &reader).run(
            assets,
            |asset, stream| {
                if asset.canonical_path().ends_with("boom.dds") {
                    panic!("kaboom");
                }
                read_all(asset, stream)
            },
            |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(matches!(
            settled[0].outcome,
            Err(TaskError::Stream(StreamError::Loose { .. }))
        ));
        match &settled[1].outcome {
            Err(TaskError::Panicked(message)) => assert_eq!(message, "kaboom"),
            other => panic!("expected panic outcome, got {:?}", other),
        }
        assert_eq!(settled[2].outcome.as_ref().unwrap(), "ok");
    }

    #[test]
    fn test_empty_input() {
        let pool = pool(1);
        let reader = ZipArchiveReader::default();
        let settled: Vec<Settled<String>> =
            FanOut::new(&pool, &reader).run(Vec::new(), read_all, |_, _, _| {}, || {});
        assert!(settled.is_empty());
    }
}
