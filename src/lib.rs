//! Mirrorfetch Core Library
//!
//! This library accelerates retrieval of already-resolved package
//! artifacts by delegating the transfer itself to an external
//! multi-connection download agent (aria2c-compatible), fed with a
//! metalink job description over its standard input.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`artifact`] - Artifact data model and filename derivation
//! - [`verify`] - Digest verification of locally cached files
//! - [`store`] - Store layout, need evaluation, and staging reconciliation
//! - [`metalink`] - Streaming transfer-description document emission
//! - [`agent`] - External download agent invocation and supervision
//! - [`resolver`] - Resolved-package manifest input
//! - [`orchestrator`] - Top-level fetch coordination

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod artifact;
pub mod metalink;
pub mod orchestrator;
pub mod resolver;
pub mod store;
pub mod verify;

// Re-export commonly used types
pub use agent::{AgentConfig, AgentDriver, AgentError, AgentOutcome, ProxyConfig, split_count};
pub use artifact::{Artifact, Digests, HashAlgorithm};
pub use metalink::MetalinkDocument;
pub use orchestrator::{FetchReport, Orchestrator};
pub use resolver::{ArtifactSource, ManifestSource, SourceError};
pub use store::reconcile::{PromoteOutcome, ReconcileSummary, promote, promote_all};
pub use store::{StoreError, StoreLayout};
pub use verify::{VerifyError, verify_file};
