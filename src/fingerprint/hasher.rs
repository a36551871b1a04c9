//! Streaming SHA-256 over files and readers.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::fingerprint::FingerprintError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Hash everything `reader` yields and render it as lowercase hex.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint the file at `path`.
pub fn compute_hash(path: impl AsRef<Path>) -> Result<String, FingerprintError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(FingerprintError::EmptyPath);
    }

    let file = File::open(path)?;
    let digest = hash_reader(file)?;

    tracing::trace!(path = %path.display(), digest = %digest, "File fingerprinted");
    Ok(digest)
}

/// [`compute_hash`] on the blocking pool, for async callers.
pub async fn compute_hash_async(path: impl Into<PathBuf>) -> Result<String, FingerprintError> {
    let path = path.into();
    tokio::task::spawn_blocking(move || compute_hash(path)).await?
}
