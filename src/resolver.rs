//! Resolved-package manifest input.
//!
//! Dependency resolution lives outside this crate; an external resolver
//! supplies the packages to fetch with their candidate version, size,
//! digests, and mirror URIs. [`ArtifactSource`] is that collaborator's
//! seam, and [`ManifestSource`] is the concrete implementation reading
//! a JSON array from a file or standard input.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::artifact::Artifact;

/// Errors loading artifacts from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The manifest could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// The manifest location ("stdin" for piped input).
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not a valid JSON artifact array.
    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// An artifact requiring transfer declares no source URIs.
    #[error("artifact {name} has no source URIs")]
    NoUris {
        /// The offending package name.
        name: String,
    },
}

/// A provider of resolved artifacts, one batch per orchestration run.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Supplies the artifacts to fetch.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the batch cannot be produced.
    async fn artifacts(&self) -> Result<Vec<Artifact>, SourceError>;
}

/// JSON manifest input: an array of resolved packages, read from a path
/// or from standard input.
#[derive(Debug)]
pub enum ManifestSource {
    /// Read the manifest from a file.
    Path(PathBuf),
    /// Read the manifest from standard input.
    Stdin,
}

#[async_trait]
impl ArtifactSource for ManifestSource {
    async fn artifacts(&self) -> Result<Vec<Artifact>, SourceError> {
        let text = match self {
            Self::Path(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SourceError::Io {
                        path: path.clone(),
                        source,
                    })?
            }
            Self::Stdin => {
                let mut buffer = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut buffer)
                    .await
                    .map_err(|source| SourceError::Io {
                        path: PathBuf::from("stdin"),
                        source,
                    })?;
                buffer
            }
        };

        let artifacts: Vec<Artifact> = serde_json::from_str(&text)?;
        for artifact in &artifacts {
            if artifact.uris.is_empty() {
                return Err(SourceError::NoUris {
                    name: artifact.name.clone(),
                });
            }
        }
        debug!(count = artifacts.len(), "manifest loaded");
        Ok(artifacts)
    }
}
