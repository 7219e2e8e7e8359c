use ocr_core::error::InitializationError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// Expected SHA-256 digests for a downloaded model package's files, keyed
/// by file name. A file with no manifest entry is not checked: callers
/// without a pinned digest for their deployment still get a working
/// engine, just without the integrity guarantee. A checksum mismatch is
/// an `InitializationError`, never a silent load of the wrong weights.
#[derive(Debug, Clone, Default)]
pub struct ModelManifest {
    checksums: HashMap<String, String>,
}

impl ModelManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checksum(mut self, file: impl Into<String>, sha256_hex: impl Into<String>) -> Self {
        self.checksums.insert(file.into(), sha256_hex.into().to_lowercase());
        self
    }

    pub fn verify(&self, file: &str, path: &Path) -> Result<(), InitializationError> {
        let Some(expected) = self.checksums.get(file) else {
            return Ok(());
        };
        let bytes = std::fs::read(path).map_err(|e| InitializationError::EngineInit {
            engine: "model_package".to_string(),
            reason: format!("reading '{file}' for checksum verification: {e}"),
        })?;
        let actual = format!("{:x}", Sha256::digest(&bytes));
        if &actual != expected {
            return Err(InitializationError::ChecksumMismatch {
                file: file.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_with_no_manifest_entry_passes_unchecked() {
        let manifest = ModelManifest::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"weights").unwrap();
        assert!(manifest.verify("model.onnx", &path).is_ok());
    }

    #[test]
    fn matching_checksum_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"weights").unwrap();
        let digest = format!("{:x}", Sha256::digest(b"weights"));
        let manifest = ModelManifest::new().with_checksum("model.onnx", digest);
        assert!(manifest.verify("model.onnx", &path).is_ok());
    }

    #[test]
    fn mismatched_checksum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"weights").unwrap();
        let manifest = ModelManifest::new().with_checksum("model.onnx", "0".repeat(64));
        let err = manifest.verify("model.onnx", &path).unwrap_err();
        assert!(matches!(err, InitializationError::ChecksumMismatch { .. }));
    }
}
