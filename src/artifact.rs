//! Artifact data model and filename derivation.
//!
//! An [`Artifact`] is one fetchable package file as supplied by the
//! external resolver: name, version, architecture, expected size, zero
//! or more digests, and an ordered list of mirror URIs. The derived
//! [`Artifact::filename`] is the join key between the artifact record
//! and on-disk state, so every component that names files goes through
//! it.

use serde::Deserialize;
use url::Url;

/// Digest algorithms accepted in a resolver manifest, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256, preferred whenever present.
    Sha256,
    /// SHA-1, used only when no SHA-256 digest exists.
    Sha1,
    /// MD5, last resort.
    Md5,
}

impl HashAlgorithm {
    /// The metalink `hash type` attribute value for this algorithm.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The digests declared for one artifact, at most one per algorithm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Digests {
    /// Hex-encoded SHA-256 digest, if declared.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Hex-encoded SHA-1 digest, if declared.
    #[serde(default)]
    pub sha1: Option<String>,
    /// Hex-encoded MD5 digest, if declared.
    #[serde(default)]
    pub md5: Option<String>,
}

impl Digests {
    /// Selects the strongest available digest: sha256 over sha1 over md5.
    ///
    /// Returns `None` when no digest is declared, which callers treat
    /// as "hash-checking is skipped for this artifact".
    #[must_use]
    pub fn strongest(&self) -> Option<(HashAlgorithm, &str)> {
        if let Some(d) = self.sha256.as_deref() {
            return Some((HashAlgorithm::Sha256, d));
        }
        if let Some(d) = self.sha1.as_deref() {
            return Some((HashAlgorithm::Sha1, d));
        }
        self.md5.as_deref().map(|d| (HashAlgorithm::Md5, d))
    }
}

/// One fetchable package file with known size, digests, and mirror URIs.
///
/// Supplied read-only per run by the external resolver; this crate never
/// mutates an artifact after manifest load.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    /// Package short name, e.g. `libssl3`.
    pub name: String,
    /// Version label; may contain `:` (epoch), which requires escaping
    /// when embedded in a filesystem path.
    pub version: String,
    /// Target architecture, e.g. `amd64`.
    pub architecture: String,
    /// Expected byte length; authoritative for completeness checks.
    pub size: u64,
    /// Declared digests, strongest-first selection via [`Digests::strongest`].
    #[serde(default)]
    pub hashes: Digests,
    /// Ordered mirror URIs. Duplicates are allowed; order expresses no
    /// priority (all sources are priority 1 in the transfer document).
    pub uris: Vec<Url>,
}

impl Artifact {
    /// Derives the on-disk filename: `{name}_{escaped(version)}_{arch}.deb`.
    ///
    /// Epoch colons in the version are escaped to `%3a` so the filename
    /// is filesystem-safe. This must be byte-for-byte identical across
    /// every component that names files; it is the only place the
    /// derivation lives.
    #[must_use]
    pub fn filename(&self) -> String {
        format!(
            "{}_{}_{}.deb",
            self.name,
            escape_version(&self.version),
            self.architecture
        )
    }

    /// The digest used for verification of this artifact, if any.
    ///
    /// Strongest-available policy, see [`Digests::strongest`].
    #[must_use]
    pub fn selected_hash(&self) -> Option<(HashAlgorithm, &str)> {
        self.hashes.strongest()
    }
}

/// Escapes a version label for embedding in a filename (`:` → `%3a`).
fn escape_version(version: &str) -> String {
    version.replace(':', "%3a")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn artifact(name: &str, version: &str, arch: &str) -> Artifact {
        Artifact {
            name: name.to_string(),
            version: version.to_string(),
            architecture: arch.to_string(),
            size: 0,
            hashes: Digests::default(),
            uris: Vec::new(),
        }
    }

    #[test]
    fn test_filename_simple_version() {
        let a = artifact("curl", "8.5.0-2", "amd64");
        assert_eq!(a.filename(), "curl_8.5.0-2_amd64.deb");
    }

    #[test]
    fn test_filename_escapes_epoch_colon() {
        let a = artifact("pkg", "1:2.3-1", "amd64");
        assert_eq!(a.filename(), "pkg_1%3a2.3-1_amd64.deb");
    }

    #[test]
    fn test_filename_escapes_every_colon() {
        let a = artifact("pkg", "1:2:3", "arm64");
        assert_eq!(a.filename(), "pkg_1%3a2%3a3_arm64.deb");
    }

    #[test]
    fn test_filename_is_stable_across_calls() {
        let a = artifact("pkg", "1:2.3-1", "amd64");
        assert_eq!(a.filename(), a.filename());
    }

    #[test]
    fn test_strongest_prefers_sha256_over_all() {
        let digests = Digests {
            sha256: Some("aa".to_string()),
            sha1: Some("bb".to_string()),
            md5: Some("cc".to_string()),
        };
        assert_eq!(digests.strongest(), Some((HashAlgorithm::Sha256, "aa")));
    }

    #[test]
    fn test_strongest_prefers_sha1_over_md5() {
        let digests = Digests {
            sha256: None,
            sha1: Some("bb".to_string()),
            md5: Some("cc".to_string()),
        };
        assert_eq!(digests.strongest(), Some((HashAlgorithm::Sha1, "bb")));
    }

    #[test]
    fn test_strongest_falls_back_to_md5() {
        let digests = Digests {
            sha256: None,
            sha1: None,
            md5: Some("cc".to_string()),
        };
        assert_eq!(digests.strongest(), Some((HashAlgorithm::Md5, "cc")));
    }

    #[test]
    fn test_strongest_none_when_no_digest_declared() {
        assert_eq!(Digests::default().strongest(), None);
    }

    #[test]
    fn test_hash_algorithm_metalink_type_strings() {
        assert_eq!(HashAlgorithm::Sha256.as_str(), "sha256");
        assert_eq!(HashAlgorithm::Sha1.as_str(), "sha1");
        assert_eq!(HashAlgorithm::Md5.as_str(), "md5");
    }

    #[test]
    fn test_artifact_deserializes_from_manifest_json() {
        let json = r#"{
            "name": "curl",
            "version": "8.5.0-2",
            "architecture": "amd64",
            "size": 270336,
            "hashes": { "sha256": "deadbeef" },
            "uris": [
                "http://mirror-a.example/pool/curl_8.5.0-2_amd64.deb",
                "http://mirror-b.example/pool/curl_8.5.0-2_amd64.deb"
            ]
        }"#;
        let a: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(a.name, "curl");
        assert_eq!(a.size, 270336);
        assert_eq!(a.uris.len(), 2);
        assert_eq!(a.selected_hash(), Some((HashAlgorithm::Sha256, "deadbeef")));
    }

    #[test]
    fn test_artifact_deserializes_without_hashes_field() {
        let json = r#"{
            "name": "curl",
            "version": "8.5.0-2",
            "architecture": "amd64",
            "size": 1,
            "uris": ["http://mirror.example/curl.deb"]
        }"#;
        let a: Artifact = serde_json::from_str(json).unwrap();
        assert!(a.selected_hash().is_none());
    }
}
