//! Artifact digests

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use plugdock_core::error::{Error, Result};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::fs(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buffer).map_err(|e| Error::fs(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare a computed digest with an expected one, ignoring hex case
pub fn matches(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sha256_of_known_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_missing_file_is_filesystem_error() {
        let dir = tempdir().unwrap();
        let err = sha256_file(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), plugdock_core::ErrorKind::Filesystem);
    }

    #[test]
    fn test_matches_ignores_case() {
        assert!(matches("ABCDEF", "abcdef"));
        assert!(!matches("abcdef", "abcde0"));
    }
}
