//! Local manifest cache: directory resolution, remote sync, and
//! lexicographic-order manifest reads.

use super::ManifestFile;
use crate::error::{BackupError, Result};
use crate::objectstore::ObjectStore;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "simple-uploader";
const DB_PREFIX: &str = "db/";

/// Sanitize a remote URL into a filesystem-safe directory component:
/// alphanumerics pass through, everything else becomes `_`. Deliberately
/// simple and stable — no percent-decoding, no normalization — for
/// cache-path compatibility across versions.
pub fn sanitize_url(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Resolve the local cache directory for a given remote URL, rooted at the
/// user's cache home (`$HOME/.cache` on Linux).
pub fn cache_dir_for(url: &str) -> Result<PathBuf> {
    let home = dirs::cache_dir()
        .ok_or_else(|| BackupError::Config("could not determine cache directory".into()))?;
    Ok(home.join(APP_DIR).join(sanitize_url(url)))
}

pub struct ManifestStore<'a> {
    pub cache_dir: PathBuf,
    store: &'a dyn ObjectStore,
}

impl<'a> ManifestStore<'a> {
    pub fn new(cache_dir: PathBuf, store: &'a dyn ObjectStore) -> Self {
        ManifestStore { cache_dir, store }
    }

    /// Sync the local cache directory against the remote manifest set,
    /// per the download_dir reconciliation rule: keep local copies that
    /// match by size (and MD5 when the remote ETag is trustworthy), else
    /// rename aside with a trailing `~` and re-download; any local file
    /// with no remote counterpart is also renamed aside. Nothing is ever
    /// deleted.
    pub fn sync(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let remote = self.store.list_current(DB_PREFIX)?;

        let mut local_names: Vec<String> = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        local_names.sort();

        for (key, info) in &remote {
            let name = key.trim_start_matches(DB_PREFIX).to_string();
            let local_path = self.cache_dir.join(&name);

            let keep = if local_path.exists() {
                let meta = std::fs::symlink_metadata(&local_path)?;
                if meta.file_type().is_symlink() {
                    false
                } else if meta.len() != info.size {
                    false
                } else if info.etag_is_md5() {
                    md5_hex(&std::fs::read(&local_path)?) == *info.etag.as_ref().unwrap()
                } else {
                    true
                }
            } else {
                false
            };

            if !keep {
                if local_path.exists() {
                    rename_aside(&local_path)?;
                }
                self.store.download(key, &local_path)?;
            }
        }

        let remote_names: std::collections::HashSet<String> = remote
            .keys()
            .map(|k| k.trim_start_matches(DB_PREFIX).to_string())
            .collect();

        for name in &local_names {
            if name.ends_with('~') {
                continue;
            }
            if !remote_names.contains(name) {
                rename_aside(&self.cache_dir.join(name))?;
            }
        }

        Ok(())
    }

    /// Read every cached manifest in ascending (lexicographic) id order.
    /// A version mismatch in any manifest is fatal.
    pub fn read_all(&self) -> Result<Vec<(String, ManifestFile)>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| !n.ends_with('~') && n.ends_with(".json"))
            .collect();
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let bytes = std::fs::read(self.cache_dir.join(&name))?;
            let manifest = ManifestFile::from_json(&bytes)?;
            if manifest.version != super::MANIFEST_VERSION {
                return Err(BackupError::Integrity(format!(
                    "manifest {name} has version {}, expected {}",
                    manifest.version,
                    super::MANIFEST_VERSION
                )));
            }
            let id = name.trim_end_matches(".json").to_string();
            out.push((id, manifest));
        }
        Ok(out)
    }

    /// Write a manifest into the local cache under `<id>.json`, so it
    /// survives on disk even if the subsequent remote upload fails.
    pub fn write_local(&self, id: &str, manifest: &ManifestFile) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join(format!("{id}.json"));
        std::fs::write(path, manifest.to_json()?)?;
        Ok(())
    }
}

fn rename_aside(path: &Path) -> Result<()> {
    let mut renamed = path.as_os_str().to_owned();
    renamed.push("~");
    std::fs::rename(path, PathBuf::from(renamed))?;
    Ok(())
}

fn md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
