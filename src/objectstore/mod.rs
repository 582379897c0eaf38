//! The abstract remote object store the core depends on.
//!
//! Two concerns are split across crates the way real S3-backed Rust
//! services do it when `object_store` alone does not cover everything:
//! [`s3::S3ObjectStore`] backs listing/upload/download with `object_store`,
//! and backs version listing and bucket-policy introspection with
//! `aws-sdk-s3`, since neither has an equivalent in the other crate.

pub mod mock;
pub mod s3;

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

/// Storage class hint passed at upload time. The set of valid strings is
/// provider-defined; this type is a thin, order-preserving wrapper so the
/// core never hard-codes a synonym list (see the Design Notes on storage
/// class literals).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageClass(pub String);

impl StorageClass {
    pub fn new(s: impl Into<String>) -> Self {
        StorageClass(s.into())
    }
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One object as seen by a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub storage_class: StorageClass,
    /// The provider ETag, verbatim. Only a 32-hex-digit value can be
    /// trusted as the content MD5; anything else (multipart uploads
    /// produce an opaque ETag) must fall back to size-only comparison.
    pub etag: Option<String>,
}

impl ObjectInfo {
    /// Whether `etag` looks like a single-part MD5, per the Design Notes.
    pub fn etag_is_md5(&self) -> bool {
        match &self.etag {
            Some(e) => e.len() == 32 && e.bytes().all(|b| b.is_ascii_hexdigit()),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LifecycleRule {
    pub enabled: bool,
    pub prefix: Option<String>,
    pub noncurrent_version_expiration_days: Option<i32>,
    pub newer_noncurrent_versions_keep: Option<i32>,
    pub abort_incomplete_multipart_upload_days: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct BucketConfig {
    pub versioning_enabled: bool,
    pub lifecycle_rules: Vec<LifecycleRule>,
    pub public_access_block_all_true: bool,
    pub has_public_access_block: bool,
    pub encryption_configured: bool,
}

/// The abstract data-plane and control-plane operations the core needs.
///
/// `upload` is the only write operation; it must refuse to overwrite a key
/// already present in the current listing. Implementations must not leave
/// a partial object at `key` on failure, and must update their in-memory
/// listing cache (if any) only on success and only outside `dry_run`.
pub trait ObjectStore {
    /// Current (non-versioned) listing under the configured prefix.
    fn list_current(&self, sub_prefix: &str) -> Result<HashMap<String, ObjectInfo>>;

    /// Current and noncurrent/outdated versions, keyed the same way, plus
    /// a map of key to its outdated versions. Errors if versioning is not
    /// supported or not enabled.
    fn list_versions(
        &self,
        sub_prefix: &str,
    ) -> Result<(HashMap<String, ObjectInfo>, HashMap<String, Vec<ObjectInfo>>)>;

    /// Download `key` to `dest`, atomically replacing any existing file.
    fn download(&self, key: &str, dest: &Path) -> Result<()>;

    /// Upload the file at `local_path` to `key` with the given class.
    /// Returns [`crate::error::BackupError::AlreadyExists`] if `key` is
    /// already present in the current listing. In `dry_run` mode, logs
    /// intent and returns `Ok` without contacting the remote or updating
    /// any cache.
    fn upload(&self, local_path: &Path, key: &str, class: &StorageClass, dry_run: bool) -> Result<()>;

    fn get_bucket_config(&self) -> Result<BucketConfig>;
}
