//! Remote invariant checking and bucket-policy sanity checks.

use crate::objectstore::{BucketConfig, ObjectStore, StorageClass};
use crate::error::Result;
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct AuditReport {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl AuditReport {
    fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.warnings.push(msg);
    }

    fn err(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!("{msg}");
        self.errors.push(msg);
    }
}

pub struct RemoteAuditor<'a> {
    store: &'a dyn ObjectStore,
    cold_class: StorageClass,
}

impl<'a> RemoteAuditor<'a> {
    pub fn new(store: &'a dyn ObjectStore, cold_class: StorageClass) -> Self {
        RemoteAuditor { store, cold_class }
    }

    /// Run the structural audit (§4.7). `verify` additionally checks
    /// noncurrent versions and bucket policy (§4.8).
    pub fn run(&self, verify: bool) -> Result<AuditReport> {
        let mut report = AuditReport::default();

        let manifests = self.store.list_current("db/")?;
        let archives = self.store.list_current("data/")?;
        let reports = self.store.list_current("report/")?;

        let manifest_ids: HashSet<String> = manifests
            .keys()
            .filter_map(|k| k.strip_prefix("db/").and_then(|s| s.strip_suffix(".json")))
            .map(str::to_string)
            .collect();
        let archive_ids: HashSet<String> = archives
            .keys()
            .filter_map(|k| k.strip_prefix("data/").and_then(|s| s.strip_suffix(".tar")))
            .map(str::to_string)
            .collect();

        for id in &manifest_ids {
            if !archive_ids.contains(id) {
                report.err(format!("manifest db/{id}.json has no matching archive data/{id}.tar"));
            }
        }
        for id in &archive_ids {
            if !manifest_ids.contains(id) {
                report.warn(format!("orphan archive data/{id}.tar has no matching manifest"));
            }
        }
        for (key, info) in &archives {
            if info.storage_class != self.cold_class {
                report.warn(format!(
                    "archive {key} is in storage class {}, expected {}",
                    info.storage_class, self.cold_class
                ));
            }
        }

        let known: HashSet<&str> = [manifests.keys(), archives.keys(), reports.keys()]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let all = self.store.list_current("")?;
        for key in all.keys() {
            if !known.contains(key.as_str()) {
                report.warn(format!("unexpected object {key}"));
            }
        }

        if verify {
            self.verify_versions(&mut report)?;
            self.verify_bucket_policy(&mut report)?;
        }

        Ok(report)
    }

    fn verify_versions(&self, report: &mut AuditReport) -> Result<()> {
        let (_, outdated) = self.store.list_versions("")?;
        for (key, versions) in outdated {
            if !versions.is_empty() {
                report.warn(format!("{key} has {} noncurrent version(s)", versions.len()));
            }
        }
        Ok(())
    }

    fn verify_bucket_policy(&self, report: &mut AuditReport) -> Result<()> {
        let config = self.store.get_bucket_config()?;
        self.check_public_access_block(&config, report);
        if config.versioning_enabled {
            self.check_noncurrent_expiration_rule(&config, report);
            self.check_abort_multipart_rule(&config, report);
        }
        Ok(())
    }

    fn check_public_access_block(&self, config: &BucketConfig, report: &mut AuditReport) {
        if !config.has_public_access_block || !config.public_access_block_all_true {
            report.err("bucket public access block is missing or not fully enabled".to_string());
        }
    }

    fn check_noncurrent_expiration_rule(&self, config: &BucketConfig, report: &mut AuditReport) {
        let ok = config.lifecycle_rules.iter().any(|r| {
            r.enabled
                && r.noncurrent_version_expiration_days.is_some()
                && r.newer_noncurrent_versions_keep.is_none()
        });
        if !ok {
            report.err("no lifecycle rule expires noncurrent versions without a keep-count".to_string());
        }
    }

    fn check_abort_multipart_rule(&self, config: &BucketConfig, report: &mut AuditReport) {
        let ok = config
            .lifecycle_rules
            .iter()
            .any(|r| r.enabled && r.abort_incomplete_multipart_upload_days.is_some());
        if !ok {
            report.err("no lifecycle rule aborts incomplete multipart uploads".to_string());
        }
    }
}
