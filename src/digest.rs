//! Canonical per-file fingerprinting.
//!
//! Regular files are hashed by content; symlinks are hashed by the UTF-8
//! bytes of their link target, which is never followed.

use crate::error::{BackupError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 digest of `path`, as lowercase hex.
pub fn digest_path(path: &Path) -> Result<String> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        digest_symlink(path)
    } else if meta.is_file() {
        digest_file(path)
    } else {
        Err(BackupError::UnsupportedFileKind {
            path: path.display().to_string(),
        })
    }
}

fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn digest_symlink(path: &Path) -> Result<String> {
    let target = std::fs::read_link(path)?;
    let target_str = target.to_str().ok_or_else(|| {
        BackupError::Config(format!("non-UTF-8 symlink target at {}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    hasher.update(target_str.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
