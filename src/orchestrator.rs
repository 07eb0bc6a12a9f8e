//! Top-level fetch coordination.
//!
//! One orchestration run filters the resolved artifact list down to
//! what the store does not already hold, drives the external agent over
//! the remainder, reconciles the staging area, and reports overall
//! success plus whatever is still missing. The run is safe to repeat:
//! promoted files are never re-downloaded, so a re-run after partial
//! failure only requests the remainder.

use tracing::{info, instrument, warn};

use crate::agent::{AgentDriver, AgentOutcome};
use crate::artifact::Artifact;
use crate::store::StoreLayout;
use crate::store::reconcile::promote_all;

/// Result of one orchestration run.
#[derive(Debug)]
pub struct FetchReport {
    /// True when every requested artifact is now present and valid in
    /// the store and the agent exited cleanly.
    pub success: bool,
    /// Filenames still missing from the store, for the caller to warn
    /// about or hand to a fallback single-connection path.
    pub missing: Vec<String>,
}

/// Coordinates need evaluation, the agent run, and reconciliation.
#[derive(Debug)]
pub struct Orchestrator {
    layout: StoreLayout,
    driver: AgentDriver,
    hash_check: bool,
}

impl Orchestrator {
    /// Creates an orchestrator over an opened store.
    #[must_use]
    pub fn new(layout: StoreLayout, driver: AgentDriver, hash_check: bool) -> Self {
        Self {
            layout,
            driver,
            hash_check,
        }
    }

    /// Runs one fetch over the resolved artifact list.
    ///
    /// Errors local to a single artifact (hash mismatch, one failed
    /// promotion) never abort the remaining artifacts; a failed agent
    /// is reported through `success = false` rather than an error so
    /// partial progress always lands in the report.
    #[instrument(skip_all, fields(resolved = artifacts.len()))]
    pub async fn fetch(&self, artifacts: &[Artifact]) -> FetchReport {
        let pending: Vec<Artifact> = artifacts
            .iter()
            .filter(|a| self.layout.needs_download(a, self.hash_check))
            .cloned()
            .collect();

        info!(
            resolved = artifacts.len(),
            already_present = artifacts.len() - pending.len(),
            pending = pending.len(),
            "evaluated local store"
        );

        if pending.is_empty() {
            return FetchReport {
                success: true,
                missing: Vec::new(),
            };
        }

        let agent_ok = match self.driver.run(&pending, &self.layout.staging_dir()).await {
            Ok(outcome) => {
                if let AgentOutcome::Failed { code } = outcome {
                    warn!(?code, "transfer agent reported failure");
                }
                outcome.is_success()
            }
            Err(err) => {
                warn!(error = %err, "transfer agent could not be driven");
                false
            }
        };

        // Reconcile regardless of how the agent fared: whatever finished
        // cleanly in staging is promoted and stays promoted.
        let summary = promote_all(&self.layout, &pending);
        info!(
            promoted = summary.promoted.len(),
            incomplete = summary.incomplete.len(),
            failed = summary.failed.len(),
            "reconciled staging area"
        );

        let mut missing = summary.incomplete;
        missing.extend(summary.failed);
        FetchReport {
            success: agent_ok && missing.is_empty(),
            missing,
        }
    }
}
