//! External download agent invocation and supervision.
//!
//! The actual multi-connection, multi-mirror transfer is delegated to
//! an aria2c-compatible agent process. This module builds its command
//! line, streams the metalink job description into its stdin, and waits
//! for it to exit. The agent is a black box: the only protocol is the
//! one-shot document on its input and its exit code plus the resulting
//! filesystem state.
//!
//! # Supervision model
//!
//! Driving the agent is an explicit two-phase protocol: a submit phase
//! (spawn, stream the document, close stdin to signal end-of-job) that
//! yields a [`RunningAgent`], and an await phase that resolves it to
//! [`AgentOutcome::Succeeded`] or a failure. The driver never retries;
//! retry is the next top-level invocation's job, which re-evaluates
//! "needs download" against the partially populated store.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, instrument, warn};

use crate::artifact::Artifact;
use crate::metalink::MetalinkDocument;

/// Default agent executable.
pub const DEFAULT_AGENT: &str = "aria2c";

/// Errors driving the agent process.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent executable could not be started.
    #[error("failed to launch download agent {program}: {source}")]
    Spawn {
        /// The executable that failed to start.
        program: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The job description could not be written to the agent's stdin.
    ///
    /// Usually means the agent exited mid-stream.
    #[error("failed to stream job description to download agent: {source}")]
    Stdin {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the agent process failed.
    #[error("failed to wait for download agent: {source}")]
    Wait {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Terminal states of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Exit code 0: the agent considers every requested transfer done.
    Succeeded,
    /// Non-zero exit: at least one transfer failed. Which ones is not
    /// parsed; reconciliation against the staging area decides.
    Failed {
        /// The agent's exit code, when one was reported.
        code: Option<i32>,
    },
    /// The run was interrupted and the interrupt forwarded to the
    /// agent. Reconciliation still runs to preserve partial progress.
    Interrupted,
}

impl AgentOutcome {
    /// True only for a clean, uninterrupted exit code 0.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Per-scheme proxy URLs handed to the agent.
///
/// Explicit configuration rather than an ambient lookup; the https
/// proxy falls back to the http value when unset.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Proxy for http sources.
    pub http: Option<String>,
    /// Proxy for https sources; defaults to `http` when unset.
    pub https: Option<String>,
    /// Proxy for ftp sources.
    pub ftp: Option<String>,
}

impl ProxyConfig {
    /// Reads proxy URLs from the conventional environment variables,
    /// lowercase first.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            http: env_either("http_proxy", "HTTP_PROXY"),
            https: env_either("https_proxy", "HTTPS_PROXY"),
            ftp: env_either("ftp_proxy", "FTP_PROXY"),
        }
    }

    /// The https proxy with fallback to the http proxy.
    #[must_use]
    pub fn https_effective(&self) -> Option<&str> {
        self.https.as_deref().or(self.http.as_deref())
    }
}

fn env_either(lower: &str, upper: &str) -> Option<String> {
    std::env::var(lower).or_else(|_| std::env::var(upper)).ok()
}

/// Configuration for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent executable; resolved via `PATH` when not absolute.
    pub program: PathBuf,
    /// Ask the agent to verify chunk integrity against the document's
    /// digests while downloading.
    pub check_integrity: bool,
    /// Per-scheme proxies appended as agent flags.
    pub proxy: ProxyConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_AGENT),
            check_integrity: false,
            proxy: ProxyConfig::default(),
        }
    }
}

/// Derives the transfer concurrency degree for a job: the maximum URI
/// fan-out across its artifacts, `0` for an empty set.
///
/// The agent's useful parallelism for any single file is bounded by how
/// many independent sources that file has, so the best-mirrored
/// artifact sets the ceiling. The agent degrades gracefully for files
/// with fewer sources than requested connections.
#[must_use]
pub fn split_count(artifacts: &[Artifact]) -> usize {
    artifacts.iter().map(|a| a.uris.len()).max().unwrap_or(0)
}

/// Builds the agent command-line arguments for one job.
///
/// The flag set pins down aria2c behavior the reconciler depends on:
/// no auto-renaming (filenames are the join key with the store), resume
/// from partials, no periodic checkpoint rewrite, and the job document
/// read from stdin.
fn build_args(config: &AgentConfig, staging: &Path, split: usize) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--no-conf".into(),
        "--metalink-file=-".into(),
        {
            let mut dir = OsString::from("--dir=");
            dir.push(staging);
            dir
        },
        format!("--split={split}").into(),
        "--auto-file-renaming=false".into(),
        "--file-allocation=none".into(),
        "--continue=true".into(),
        "--auto-save-interval=0".into(),
    ];
    if config.check_integrity {
        args.push("--check-integrity=true".into());
    }
    if let Some(proxy) = config.proxy.http.as_deref() {
        args.push(format!("--http-proxy={proxy}").into());
    }
    if let Some(proxy) = config.proxy.https_effective() {
        args.push(format!("--https-proxy={proxy}").into());
    }
    if let Some(proxy) = config.proxy.ftp.as_deref() {
        args.push(format!("--ftp-proxy={proxy}").into());
    }
    args
}

/// An agent process that has received its full job description and is
/// transferring. Resolves via [`RunningAgent::await_completion`].
#[derive(Debug)]
pub struct RunningAgent {
    child: Child,
}

impl RunningAgent {
    /// Waits for the agent to exit, forwarding Ctrl-C to it.
    ///
    /// On interrupt the agent gets SIGINT (it saves its control files
    /// and exits), we wait for it, and report
    /// [`AgentOutcome::Interrupted`] so the caller still reconciles
    /// whatever was staged. No timeout is imposed: the agent owns
    /// retry and timeout policy for the transport layer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Wait`] when waiting on the process fails.
    pub async fn await_completion(mut self) -> Result<AgentOutcome, AgentError> {
        let status = tokio::select! {
            status = self.child.wait() => {
                status.map_err(|source| AgentError::Wait { source })?
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupt received, forwarding to download agent");
                forward_interrupt(&mut self.child);
                let _ = self
                    .child
                    .wait()
                    .await
                    .map_err(|source| AgentError::Wait { source })?;
                return Ok(AgentOutcome::Interrupted);
            }
        };

        if status.success() {
            debug!("download agent exited successfully");
            Ok(AgentOutcome::Succeeded)
        } else {
            warn!(code = ?status.code(), "download agent reported failure");
            Ok(AgentOutcome::Failed {
                code: status.code(),
            })
        }
    }
}

#[cfg(unix)]
fn forward_interrupt(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SIGINT lets aria2c flush its control files before exiting.
        #[allow(clippy::cast_possible_wrap)]
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGINT);
        }
    }
}

#[cfg(not(unix))]
fn forward_interrupt(child: &mut Child) {
    let _ = child.start_kill();
}

/// Launches the agent and interprets its exit status for one job.
#[derive(Debug, Default)]
pub struct AgentDriver {
    config: AgentConfig,
}

impl AgentDriver {
    /// Creates a driver with the given invocation configuration.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Submit phase: spawns the agent pointed at `staging` and streams
    /// the metalink document for `artifacts` into its stdin, then
    /// closes the stream to signal end-of-job.
    ///
    /// Stdout and stderr are inherited so the user observes live
    /// transfer progress.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Spawn`] when the executable cannot start
    /// and [`AgentError::Stdin`] when the document cannot be streamed
    /// (typically the agent died mid-stream).
    pub async fn submit(
        &self,
        artifacts: &[Artifact],
        staging: &Path,
    ) -> Result<RunningAgent, AgentError> {
        let split = split_count(artifacts).max(1);
        let args = build_args(&self.config, staging, split);
        info!(
            agent = %self.config.program.display(),
            split,
            files = artifacts.len(),
            "launching download agent"
        );

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| AgentError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let Some(mut stdin) = child.stdin.take() else {
            // Unreachable with Stdio::piped, but do not panic in library code.
            return Err(AgentError::Stdin {
                source: std::io::Error::other("agent stdin was not piped"),
            });
        };

        let document = MetalinkDocument::new(artifacts);
        for chunk in document.chunks() {
            stdin
                .write_all(chunk.as_bytes())
                .await
                .map_err(|source| AgentError::Stdin { source })?;
        }
        stdin
            .shutdown()
            .await
            .map_err(|source| AgentError::Stdin { source })?;
        drop(stdin);

        Ok(RunningAgent { child })
    }

    /// Runs one complete transfer job: submit, then await completion.
    ///
    /// No-op success for an empty artifact set. Never retries.
    ///
    /// # Errors
    ///
    /// Propagates [`AgentError`] from either phase.
    #[instrument(skip_all, fields(artifacts = artifacts.len()))]
    pub async fn run(
        &self,
        artifacts: &[Artifact],
        staging: &Path,
    ) -> Result<AgentOutcome, AgentError> {
        if artifacts.is_empty() {
            debug!("nothing to transfer");
            return Ok(AgentOutcome::Succeeded);
        }
        let running = self.submit(artifacts, staging).await?;
        running.await_completion().await
    }
}
