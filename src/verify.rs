//! Digest verification of locally cached artifact files.
//!
//! Recomputes the declared digest of a file on disk and compares it
//! case-insensitively against the expected hex string. A missing file
//! is a verification failure, not an error; callers only need to log
//! genuine I/O problems.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::artifact::HashAlgorithm;

/// Errors from digest verification.
///
/// File-not-found is deliberately not represented here: a missing file
/// means "verification fails", and [`verify_file`] returns `Ok(false)`
/// for it so callers can distinguish absence from real I/O trouble.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// I/O error other than not-found while opening or reading the file.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Verifies that `path` hashes to `expected` under `algorithm`.
///
/// Returns `Ok(false)` when the file does not exist or the digest does
/// not match, `Ok(true)` on a match. The hex comparison is
/// case-insensitive. No side effects.
///
/// # Errors
///
/// Returns [`VerifyError::Io`] for open/read failures other than
/// not-found.
pub fn verify_file(
    path: &Path,
    algorithm: HashAlgorithm,
    expected: &str,
) -> Result<bool, VerifyError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "file absent, verification fails");
            return Ok(false);
        }
        Err(err) => {
            return Err(VerifyError::Io {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    let computed = match algorithm {
        HashAlgorithm::Sha256 => stream_digest::<Sha256>(&mut file),
        HashAlgorithm::Sha1 => stream_digest::<Sha1>(&mut file),
        HashAlgorithm::Md5 => stream_digest::<Md5>(&mut file),
    }
    .map_err(|source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let matched = computed.eq_ignore_ascii_case(expected);
    if !matched {
        debug!(
            path = %path.display(),
            %algorithm,
            expected,
            computed,
            "digest mismatch"
        );
    }
    Ok(matched)
}

/// Streams a reader through a digest and returns the lowercase hex string.
fn stream_digest<D: Digest>(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Digests of the ASCII string "hello".
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    fn write_hello(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("hello.deb");
        std::fs::write(&path, b"hello").unwrap();
        path
    }

    #[test]
    fn test_verify_sha256_match() {
        let dir = TempDir::new().unwrap();
        let path = write_hello(&dir);
        assert!(verify_file(&path, HashAlgorithm::Sha256, HELLO_SHA256).unwrap());
    }

    #[test]
    fn test_verify_sha1_match() {
        let dir = TempDir::new().unwrap();
        let path = write_hello(&dir);
        assert!(verify_file(&path, HashAlgorithm::Sha1, HELLO_SHA1).unwrap());
    }

    #[test]
    fn test_verify_md5_match() {
        let dir = TempDir::new().unwrap();
        let path = write_hello(&dir);
        assert!(verify_file(&path, HashAlgorithm::Md5, HELLO_MD5).unwrap());
    }

    #[test]
    fn test_verify_comparison_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_hello(&dir);
        let upper = HELLO_SHA256.to_uppercase();
        assert!(verify_file(&path, HashAlgorithm::Sha256, &upper).unwrap());
    }

    #[test]
    fn test_verify_mismatch_returns_false() {
        let dir = TempDir::new().unwrap();
        let path = write_hello(&dir);
        assert!(!verify_file(&path, HashAlgorithm::Sha256, HELLO_MD5).unwrap());
    }

    #[test]
    fn test_verify_missing_file_is_false_not_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.deb");
        let result = verify_file(&path, HashAlgorithm::Sha256, HELLO_SHA256);
        assert!(!result.unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_directory_is_io_error() {
        // Reading a directory as a file fails regardless of the uid the
        // tests run under, unlike permission-stripped files.
        let dir = TempDir::new().unwrap();
        let result = verify_file(dir.path(), HashAlgorithm::Sha256, HELLO_SHA256);
        assert!(matches!(result, Err(VerifyError::Io { .. })));
    }

    #[test]
    fn test_verify_error_display_names_path() {
        let err = VerifyError::Io {
            path: PathBuf::from("/tmp/x.deb"),
            source: io::Error::new(ErrorKind::PermissionDenied, "access denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.deb"), "Expected path in: {msg}");
    }
}
