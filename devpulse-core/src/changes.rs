//! Diff statistics and their aggregation across pull requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::PullRequest;

/// Lines added and removed in a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Added lines.
    pub additions: u64,
    /// Removed lines.
    pub deletions: u64,
}

impl FileChange {
    /// Build a file change from raw counts.
    pub fn new(additions: u64, deletions: u64) -> Self {
        Self {
            additions,
            deletions,
        }
    }
}

/// Additive diff statistics with a per-file breakdown.
///
/// `additions` and `deletions` always equal the sums over `files`; the only
/// way to add counts is [`Changes::record`] or [`Changes::absorb`], which
/// update both sides together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    /// Total added lines.
    pub additions: u64,
    /// Total removed lines.
    pub deletions: u64,
    /// Per-file counts keyed by canonical path.
    pub files: BTreeMap<String, FileChange>,
}

impl Changes {
    /// Create an empty set of changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add counts for `path`, summing with any counts already recorded there.
    pub fn record(&mut self, path: impl Into<String>, change: FileChange) {
        let entry = self.files.entry(path.into()).or_default();
        entry.additions += change.additions;
        entry.deletions += change.deletions;
        self.additions += change.additions;
        self.deletions += change.deletions;
    }

    /// Fold another set of changes into this one.
    pub fn absorb(&mut self, other: &Changes) {
        for (path, change) in &other.files {
            self.record(path.clone(), *change);
        }
    }

    /// Number of distinct files touched.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// A pull request together with its own diff statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedPr {
    /// The pull request as listed by the host.
    #[serde(flatten)]
    pub pull_request: PullRequest,
    /// Diff statistics for this pull request only.
    #[serde(flatten)]
    pub changes: Changes,
}

/// Merge many change sets into one aggregate.
pub fn total_changes<'a, I>(changes: I) -> Changes
where
    I: IntoIterator<Item = &'a Changes>,
{
    changes
        .into_iter()
        .fold(Changes::new(), |mut total, change| {
            total.absorb(change);
            total
        })
}
