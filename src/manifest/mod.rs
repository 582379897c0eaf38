//! Manifest schema: the on-disk JSON shape and the logical identity of a
//! file entry within one manifest.
//!
//! The on-disk schema is deliberately a separate type from the
//! runtime-enriched entry used by [`crate::database::BackupDatabase`]: the
//! owning archive id and the alternates chain are derived at load time and
//! must never leak into the serialized form.

pub mod store;

use crate::types::ArchiveId;
use serde::{Deserialize, Serialize};

pub const MANIFEST_VERSION: u32 = 1;

/// One file as recorded in a single manifest. This is the on-disk shape:
/// field order is fixed (`name, size, modified, sha`) and nothing else is
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: chrono::DateTime<chrono::Utc>,
    pub sha: String,
}

/// The on-disk manifest document at `db/<archive-id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub version: u32,
    pub data: Vec<FileEntry>,
}

impl ManifestFile {
    pub fn new(data: Vec<FileEntry>) -> Self {
        ManifestFile {
            version: MANIFEST_VERSION,
            data,
        }
    }

    /// Serialize with four-space indentation, matching the documented
    /// on-disk schema byte-for-byte (`serde_json`'s default pretty
    /// formatter indents with two spaces).
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A [`FileEntry`] tagged with the manifest id that owns it. This is the
/// unit [`crate::database::BackupDatabase`] ingests; it never round-trips
/// to JSON directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFileEntry {
    pub entry: FileEntry,
    pub manifest_id: ArchiveId,
}
