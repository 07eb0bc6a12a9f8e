//! Promotion of completed staged files into the final store.
//!
//! The download agent writes into `store/partial` and keeps a control
//! file (`<filename>.aria2`) alive while a transfer is incomplete,
//! removing it on success. Promotion moves a staged file into the store
//! with an atomic rename, and the control sentinel is the sole gate: a
//! staged file with a sentinel is never promoted.

use std::fs;
use std::io::ErrorKind;

use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::store::StoreLayout;

/// Extension of the agent's per-file progress sentinel.
pub const CONTROL_EXTENSION: &str = "aria2";

/// Outcome of one promotion attempt.
#[derive(Debug)]
pub enum PromoteOutcome {
    /// The staged file was moved into the store.
    Promoted,
    /// The transfer is unfinished (sentinel present) or nothing was
    /// ever staged. Both directories are left untouched.
    StillIncomplete,
    /// The staged file exists and is complete but could not be moved.
    Error(std::io::Error),
}

impl PromoteOutcome {
    /// True when the artifact landed in the store.
    #[must_use]
    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted)
    }
}

/// Attempts to promote one artifact from staging into the store.
///
/// Rename only, never copy. A missing source is benign
/// ([`PromoteOutcome::StillIncomplete`]): the agent may have failed
/// before staging anything, or an earlier run already promoted the
/// file, which also makes promotion idempotent.
#[must_use]
pub fn promote(layout: &StoreLayout, artifact: &Artifact) -> PromoteOutcome {
    let staged = layout.staged_path(artifact);
    let target = layout.store_path(artifact);
    let sentinel = {
        let mut name = staged.clone().into_os_string();
        name.push(".");
        name.push(CONTROL_EXTENSION);
        std::path::PathBuf::from(name)
    };

    if sentinel.exists() {
        debug!(file = %staged.display(), "control sentinel present, transfer unfinished");
        return PromoteOutcome::StillIncomplete;
    }

    match fs::rename(&staged, &target) {
        Ok(()) => {
            debug!(file = %target.display(), "promoted");
            PromoteOutcome::Promoted
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(file = %staged.display(), "nothing staged");
            PromoteOutcome::StillIncomplete
        }
        Err(err) => {
            warn!(file = %staged.display(), error = %err, "promotion failed");
            PromoteOutcome::Error(err)
        }
    }
}

/// Result of reconciling all requested artifacts, by filename.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    /// Filenames moved into the store by this pass.
    pub promoted: Vec<String>,
    /// Filenames still incomplete or never staged.
    pub incomplete: Vec<String>,
    /// Filenames whose staged file could not be moved.
    pub failed: Vec<String>,
}

impl ReconcileSummary {
    /// True when every requested artifact was promoted.
    #[must_use]
    pub fn all_promoted(&self) -> bool {
        self.incomplete.is_empty() && self.failed.is_empty()
    }
}

/// Reconciles every requested artifact, never aborting early.
///
/// Per-artifact failures are recorded and logged; the remaining
/// artifacts are always attempted so partial progress is preserved.
#[must_use]
pub fn promote_all(layout: &StoreLayout, artifacts: &[Artifact]) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    for artifact in artifacts {
        let filename = artifact.filename();
        match promote(layout, artifact) {
            PromoteOutcome::Promoted => summary.promoted.push(filename),
            PromoteOutcome::StillIncomplete => summary.incomplete.push(filename),
            PromoteOutcome::Error(_) => summary.failed.push(filename),
        }
    }
    summary
}
