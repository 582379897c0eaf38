//! An in-memory [`ObjectStore`], used to exercise `Packer`, `BackupDatabase`
//! and `RemoteAuditor` without any network dependency. Plays the role the
//! teacher's tempfile-backed cache fixtures play for the document/cache
//! tests: the crate's primary test harness for the remote-facing pieces.

use super::{BucketConfig, ObjectInfo, ObjectStore, StorageClass};
use crate::error::{BackupError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, StorageClass)>>,
    pub bucket_config: BucketConfig,
}

impl MockObjectStore {
    pub fn new() -> Self {
        MockObjectStore::default()
    }

    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(b, _)| b.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Seed an object directly, bypassing the `AlreadyExists` check. Used
    /// by tests to set up a pre-existing remote state.
    pub fn seed(&self, key: &str, bytes: Vec<u8>, class: StorageClass) {
        self.objects.lock().unwrap().insert(key.to_string(), (bytes, class));
    }
}

impl ObjectStore for MockObjectStore {
    fn list_current(&self, sub_prefix: &str) -> Result<HashMap<String, ObjectInfo>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(sub_prefix))
            .map(|(k, (bytes, class))| {
                (
                    k.clone(),
                    ObjectInfo {
                        key: k.clone(),
                        size: bytes.len() as u64,
                        storage_class: class.clone(),
                        etag: None,
                    },
                )
            })
            .collect())
    }

    fn list_versions(
        &self,
        sub_prefix: &str,
    ) -> Result<(HashMap<String, ObjectInfo>, HashMap<String, Vec<ObjectInfo>>)> {
        Ok((self.list_current(sub_prefix)?, HashMap::new()))
    }

    fn download(&self, key: &str, dest: &Path) -> Result<()> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(b, _)| b.clone())
            .ok_or_else(|| BackupError::Transport(format!("not found: {key}")))?;
        let tmp = dest.with_extension("tmp-download");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, dest)?;
        Ok(())
    }

    fn upload(&self, local_path: &Path, key: &str, class: &StorageClass, dry_run: bool) -> Result<()> {
        if self.objects.lock().unwrap().contains_key(key) {
            return Err(BackupError::AlreadyExists { key: key.to_string() });
        }
        if dry_run {
            return Ok(());
        }
        let bytes = std::fs::read(local_path)?;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, class.clone()));
        Ok(())
    }

    fn get_bucket_config(&self) -> Result<BucketConfig> {
        Ok(self.bucket_config.clone())
    }
}
