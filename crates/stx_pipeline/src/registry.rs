//! Claim-once registry of canonical asset paths.
//!
//! Mods are fed in from highest to lowest priority, so whichever candidate
//! claims a path first is the override winner. Every later candidate for the
//! same path is turned away silently.

use crate::model::AssetCandidate;
use std::collections::HashMap;

/// Result of [`DedupRegistry::claim_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    AlreadyTaken,
}

/// How a claimed path was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Accepted,
    Excluded(String),
}

#[derive(Debug)]
enum Entry {
    Pending(AssetCandidate),
    Tombstone(Resolution),
}

/// Canonical path -> pending candidate or tombstone.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    entries: HashMap<String, Entry>,
    /// Claim order, so draining is deterministic.
    order: Vec<String>,
    rejected: usize,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_if_absent(&mut self, candidate: AssetCandidate) -> Claim {
        if self.entries.contains_key(candidate.canonical_path()) {
            self.rejected += 1;
            return Claim::AlreadyTaken;
        }

        let key = candidate.canonical_path().to_string();
        self.order.push(key.clone());
        self.entries.insert(key, Entry::Pending(candidate));
        Claim::Claimed
    }

    #[cfg(test)]
    pub fn is_claimed(&self, canonical_path: &str) -> bool {
        self.entries.contains_key(canonical_path)
    }

    /// Remove every pending candidate, in claim order, leaving an `Accepted`
    /// tombstone behind. Callers tombstone the ones they later exclude.
    pub fn take_pending(&mut self) -> Vec<AssetCandidate> {
        let mut pending = Vec::new();
        for key in &self.order {
            if let Some(entry) = self.entries.get_mut(key) {
                if matches!(entry, Entry::Pending(_)) {
                    let taken = std::mem::replace(entry, Entry::Tombstone(Resolution::Accepted));
                    if let Entry::Pending(candidate) = taken {
                        pending.push(candidate);
                    }
                }
            }
        }
        pending
    }

    /// Record that a claimed path was excluded. Unknown paths are ignored.
    pub fn mark_excluded(&mut self, canonical_path: &str, reason: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(canonical_path) {
            *entry = Entry::Tombstone(Resolution::Excluded(reason.into()));
        }
    }

    /// `None` while the path is unclaimed or still pending.
    #[cfg(test)]
    pub fn resolution(&self, canonical_path: &str) -> Option<&Resolution> {
        match self.entries.get(canonical_path)? {
            Entry::Pending(_) => None,
            Entry::Tombstone(resolution) => Some(resolution),
        }
    }

    /// Number of distinct paths claimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of claims turned away because the path was taken.
    pub fn duplicates(&self) -> usize {
        self.rejected
    }
}
