//! Concrete S3-class adapter.
//!
//! `object_store` backs plain get/put (`download`/`upload`); `aws-sdk-s3`
//! backs every operation that needs a storage class or version history —
//! `list_current`, `list_versions`, `get_bucket_config` — since
//! `object_store`'s generic `ObjectMeta` has no storage-class field. Both
//! clients are built from the same parsed URL so they always agree on
//! bucket and prefix. Every trait method here is a blocking call that
//! drives a private current-thread Tokio runtime, so the rest of the core
//! — `Packer`, `RemoteAuditor`, `ReportWriter` — never has to reason about
//! async.

use super::{BucketConfig, LifecycleRule, ObjectInfo, ObjectStore, StorageClass};
use crate::error::{BackupError, Result};
use aws_sdk_s3::Client as AwsClient;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore as _, PutPayload};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::runtime::Runtime;

/// Normalize a remote prefix: strip a leading slash, enforce exactly one
/// trailing slash when nonempty.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed.trim_end_matches('/'))
    }
}

pub struct S3ObjectStore {
    bucket: String,
    prefix: String,
    store: AmazonS3,
    aws_client: AwsClient,
    runtime: Runtime,
    /// In-memory listing cache, updated on successful non-dry-run uploads.
    seen: Mutex<HashMap<String, ObjectInfo>>,
}

impl S3ObjectStore {
    pub fn new(bucket: &str, prefix: &str, region: Option<&str>) -> Result<Self> {
        let runtime = Runtime::new().map_err(|e| BackupError::Transport(e.to_string()))?;

        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        let store = builder
            .build()
            .map_err(|e| BackupError::Config(format!("failed to build s3 client: {e}")))?;

        let aws_client = runtime.block_on(async {
            let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            AwsClient::new(&shared_config)
        });

        Ok(S3ObjectStore {
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
            store,
            aws_client,
            runtime,
            seen: Mutex::new(HashMap::new()),
        })
    }

    fn full_key(&self, sub_prefix: &str, key: &str) -> String {
        format!("{}{}{}", self.prefix, sub_prefix, key)
    }
}

impl ObjectStore for S3ObjectStore {
    /// Listed via `aws-sdk-s3`'s `list_objects_v2`, not `object_store`'s
    /// generic `list`: `object_store`'s `ObjectMeta` has no storage-class
    /// field, so going through it would force every object to report a
    /// fabricated class and silently defeat the I5 audit check. The
    /// original Python tool reads `content["StorageClass"]` the same way
    /// (`simple_s3.py::list_files`).
    fn list_current(&self, sub_prefix: &str) -> Result<HashMap<String, ObjectInfo>> {
        let full_prefix = format!("{}{}", self.prefix, sub_prefix);
        self.runtime.block_on(async {
            let mut out = HashMap::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let mut req = self
                    .aws_client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&full_prefix);
                if let Some(token) = &continuation_token {
                    req = req.continuation_token(token);
                }
                let resp = req
                    .send()
                    .await
                    .map_err(|e| BackupError::Transport(e.to_string()))?;

                for obj in resp.contents() {
                    let key = obj.key().unwrap_or_default().to_string();
                    out.insert(
                        key.clone(),
                        ObjectInfo {
                            key,
                            size: obj.size().unwrap_or_default() as u64,
                            storage_class: StorageClass::new(
                                obj.storage_class().map(|c| c.as_str()).unwrap_or("STANDARD"),
                            ),
                            etag: obj.e_tag().map(|s| s.trim_matches('"').to_string()),
                        },
                    );
                }

                if resp.is_truncated().unwrap_or(false) {
                    continuation_token = resp.next_continuation_token().map(|s| s.to_string());
                } else {
                    break;
                }
            }
            Ok(out)
        })
    }

    fn list_versions(
        &self,
        sub_prefix: &str,
    ) -> Result<(HashMap<String, ObjectInfo>, HashMap<String, Vec<ObjectInfo>>)> {
        let full_prefix = format!("{}{}", self.prefix, sub_prefix);
        self.runtime.block_on(async {
            let mut current = HashMap::new();
            let mut outdated: HashMap<String, Vec<ObjectInfo>> = HashMap::new();
            let mut key_marker: Option<String> = None;
            loop {
                let mut req = self
                    .aws_client
                    .list_object_versions()
                    .bucket(&self.bucket)
                    .prefix(&full_prefix);
                if let Some(marker) = &key_marker {
                    req = req.key_marker(marker);
                }
                let resp = req
                    .send()
                    .await
                    .map_err(|e| BackupError::Transport(e.to_string()))?;

                for v in resp.versions() {
                    let key = v.key().unwrap_or_default().to_string();
                    let info = ObjectInfo {
                        key: key.clone(),
                        size: v.size().unwrap_or_default() as u64,
                        storage_class: StorageClass::new(
                            v.storage_class().map(|c| c.as_str()).unwrap_or("STANDARD"),
                        ),
                        etag: v.e_tag().map(|s| s.trim_matches('"').to_string()),
                    };
                    if v.is_latest().unwrap_or(false) {
                        current.insert(key, info);
                    } else {
                        outdated.entry(key).or_default().push(info);
                    }
                }

                if resp.is_truncated().unwrap_or(false) {
                    key_marker = resp.next_key_marker().map(|s| s.to_string());
                } else {
                    break;
                }
            }
            Ok((current, outdated))
        })
    }

    fn download(&self, key: &str, dest: &Path) -> Result<()> {
        let full = self.full_key("", key);
        let object_path = ObjectPath::from(full.as_str());
        self.runtime.block_on(async {
            let get = self
                .store
                .get(&object_path)
                .await
                .map_err(|e| BackupError::Transport(e.to_string()))?;
            let bytes = get
                .bytes()
                .await
                .map_err(|e| BackupError::Transport(e.to_string()))?;

            let tmp = dest.with_extension("tmp-download");
            tokio::fs::write(&tmp, &bytes)
                .await
                .map_err(BackupError::Io)?;
            tokio::fs::rename(&tmp, dest).await.map_err(BackupError::Io)?;
            Ok(())
        })
    }

    fn upload(&self, local_path: &Path, key: &str, class: &StorageClass, dry_run: bool) -> Result<()> {
        let full = self.full_key("", key);

        if self.seen.lock().unwrap().contains_key(&full) {
            return Err(BackupError::AlreadyExists { key: full });
        }

        if dry_run {
            tracing::info!(key = %full, class = %class, "dry-run: would upload");
            return Ok(());
        }

        let object_path = ObjectPath::from(full.as_str());
        let bytes = std::fs::read(local_path)?;
        let size = bytes.len() as u64;

        self.runtime.block_on(async {
            self.store
                .put(&object_path, PutPayload::from_bytes(bytes.into()))
                .await
                .map_err(|e| BackupError::Transport(e.to_string()))
        })?;
        tracing::debug!(key = %full, size = %size, "upload complete");

        self.seen.lock().unwrap().insert(
            full.clone(),
            ObjectInfo {
                key: full,
                size,
                storage_class: class.clone(),
                etag: None,
            },
        );
        Ok(())
    }

    fn get_bucket_config(&self) -> Result<BucketConfig> {
        self.runtime.block_on(async {
            let versioning = self
                .aws_client
                .get_bucket_versioning()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(|e| BackupError::Transport(e.to_string()))?;
            let versioning_enabled = matches!(
                versioning.status(),
                Some(aws_sdk_s3::types::BucketVersioningStatus::Enabled)
            );

            let lifecycle_rules = match self
                .aws_client
                .get_bucket_lifecycle_configuration()
                .bucket(&self.bucket)
                .send()
                .await
            {
                Ok(resp) => resp
                    .rules()
                    .iter()
                    .map(|r| LifecycleRule {
                        enabled: matches!(r.status(), aws_sdk_s3::types::ExpirationStatus::Enabled),
                        prefix: r.filter().and_then(|f| f.prefix().map(|p| p.to_string())),
                        noncurrent_version_expiration_days: r
                            .noncurrent_version_expiration()
                            .and_then(|e| e.noncurrent_days()),
                        newer_noncurrent_versions_keep: r
                            .noncurrent_version_expiration()
                            .and_then(|e| e.newer_noncurrent_versions()),
                        abort_incomplete_multipart_upload_days: r
                            .abort_incomplete_multipart_upload()
                            .and_then(|a| a.days_after_initiation()),
                    })
                    .collect(),
                Err(_) => Vec::new(),
            };

            let (has_public_access_block, public_access_block_all_true) = match self
                .aws_client
                .get_public_access_block()
                .bucket(&self.bucket)
                .send()
                .await
            {
                Ok(resp) => {
                    if let Some(cfg) = resp.public_access_block_configuration() {
                        let all = cfg.block_public_acls().unwrap_or(false)
                            && cfg.ignore_public_acls().unwrap_or(false)
                            && cfg.block_public_policy().unwrap_or(false)
                            && cfg.restrict_public_buckets().unwrap_or(false);
                        (true, all)
                    } else {
                        (false, false)
                    }
                }
                Err(_) => (false, false),
            };

            let encryption_configured = self
                .aws_client
                .get_bucket_encryption()
                .bucket(&self.bucket)
                .send()
                .await
                .is_ok();

            let config = BucketConfig {
                versioning_enabled,
                lifecycle_rules,
                public_access_block_all_true,
                has_public_access_block,
                encryption_configured,
            };
            tracing::info!("{config:#?}");
            Ok(config)
        })
    }
}
