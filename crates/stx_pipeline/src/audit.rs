//! Audit trail of per-asset outcomes.
//!
//! Three append-only text logs live in the output root:
//!
//! - `main.log`: one line per resized asset
//! - `exclusions.log`: one line per excluded asset, with the reason
//! - `errors.log`: one line per failure
//!
//! Writes are best-effort: a failing append is reported through `tracing` and
//! never changes how the asset itself is processed.

use crate::model::AssetCandidate;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

pub const GENERAL_LOG: &str = "main.log";
pub const EXCLUSION_LOG: &str = "exclusions.log";
pub const ERROR_LOG: &str = "errors.log";

/// Sink for audit events. Must be safe to call from many tasks at once.
pub trait AuditLog: Send + Sync {
    fn exclusion(&self, reason: &str, asset: &AssetCandidate);
    fn error(&self, message: &str);
    fn general(&self, summary: &str, asset: &AssetCandidate);
}

fn asset_line(prefix: &str, asset: &AssetCandidate) -> String {
    format!("{} - {}", prefix, asset)
}

/// Appends each event as one line to its log file.
///
/// Each sink has its own lock and every line goes out in a single
/// `write_all`, so concurrent events never interleave within a line.
pub struct FileAuditLog {
    general: LogSink,
    exclusions: LogSink,
    errors: LogSink,
}

impl FileAuditLog {
    /// Open (or create) the three logs inside `dir`.
    pub fn open(dir: &Utf8Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            general: LogSink::open(dir.join(GENERAL_LOG))?,
            exclusions: LogSink::open(dir.join(EXCLUSION_LOG))?,
            errors: LogSink::open(dir.join(ERROR_LOG))?,
        })
    }
}

impl AuditLog for FileAuditLog {
    fn exclusion(&self, reason: &str, asset: &AssetCandidate) {
        self.exclusions.append(&asset_line(reason, asset));
    }

    fn error(&self, message: &str) {
        self.errors.append(message);
    }

    fn general(&self, summary: &str, asset: &AssetCandidate) {
        self.general.append(&asset_line(summary, asset));
    }
}

struct LogSink {
    path: Utf8PathBuf,
    file: Mutex<File>,
}

impl LogSink {
    fn open(path: Utf8PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append(&self, line: &str) {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line.trim_end_matches(['\r', '\n']));
        buf.push('\n');

        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut result = file.write_all(buf.as_bytes());
        if result.is_ok() {
            result = file.flush();
        }
        if let Err(e) = result {
            tracing::warn!("Failed to append to {}: {}", self.path, e);
        }
    }
}

/// Discards every event. Used when logging is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditLog;

impl AuditLog for NoopAuditLog {
    fn exclusion(&self, _reason: &str, _asset: &AssetCandidate) {}
    fn error(&self, _message: &str) {}
    fn general(&self, _summary: &str, _asset: &AssetCandidate) {}
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    general: Mutex<Vec<String>>,
    exclusions: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn general_lines(&self) -> Vec<String> {
        snapshot(&self.general)
    }

    pub fn exclusion_lines(&self) -> Vec<String> {
        snapshot(&self.exclusions)
    }

    pub fn error_lines(&self) -> Vec<String> {
        snapshot(&self.errors)
    }
}

fn snapshot(lines: &Mutex<Vec<String>>) -> Vec<String> {
    match lines.lock() {
        Ok(l) => l.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn push(lines: &Mutex<Vec<String>>, line: String) {
    match lines.lock() {
        Ok(mut l) => l.push(line),
        Err(poisoned) => poisoned.into_inner().push(line),
    }
}

impl AuditLog for MemoryAuditLog {
    fn exclusion(&self, reason: &str, asset: &AssetCandidate) {
        push(&self.exclusions, asset_line(reason, asset));
    }

    fn error(&self, message: &str) {
        push(&self.errors, message.to_string());
    }

    fn general(&self, summary: &str, asset: &AssetCandidate) {
        push(&self.general, asset_line(summary, asset));
    }
}
