//! The main pipeline: diff local files against the database, stream
//! selected files into size-bounded tar archives, and upload each
//! archive/manifest pair.

use crate::database::BackupDatabase;
use crate::digest::digest_path;
use crate::error::Result;
use crate::manifest::store::ManifestStore;
use crate::manifest::{FileEntry, ManifestFile};
use crate::objectstore::{ObjectStore, StorageClass};
use crate::types::{ArchiveId, ArchiveIdGenerator};
use chrono::Utc;

pub const DEFAULT_MIN_SIZE: u64 = 256 * 1024 * 1024;

pub struct Packer<'a> {
    indir: std::path::PathBuf,
    cold_class: StorageClass,
    min_size: u64,
    dry_run: bool,
    db: &'a BackupDatabase,
    store: &'a dyn ObjectStore,
    manifests: &'a ManifestStore<'a>,
    ids: ArchiveIdGenerator,
}

#[derive(Debug, Default)]
pub struct PackSummary {
    pub archives_written: usize,
    pub files_packed: usize,
    pub files_skipped: usize,
    pub bytes_packed: u64,
}

impl<'a> Packer<'a> {
    pub fn new(
        indir: std::path::PathBuf,
        cold_class: StorageClass,
        min_size: u64,
        dry_run: bool,
        db: &'a BackupDatabase,
        store: &'a dyn ObjectStore,
        manifests: &'a ManifestStore<'a>,
    ) -> Self {
        Packer {
            indir,
            cold_class,
            min_size,
            dry_run,
            db,
            store,
            manifests,
            ids: ArchiveIdGenerator::new(Utc::now()),
        }
    }

    /// Pack every path in `files` (root-relative, as produced by
    /// [`crate::walker::list_files`]), skipping anything whose content
    /// hash already matches the database's current entry.
    pub fn run(&mut self, files: &[String]) -> Result<PackSummary> {
        let mut summary = PackSummary::default();
        let mut batch: Vec<FileEntry> = Vec::new();
        let mut batch_bytes: u64 = 0;
        let mut skipped_since_log = 0u32;

        for name in files {
            let path = self.indir.join(name);
            let sha = digest_path(&path)?;
            let meta = std::fs::symlink_metadata(&path)?;
            let size = if meta.file_type().is_symlink() {
                std::fs::read_link(&path)?.to_string_lossy().len() as u64
            } else {
                meta.len()
            };

            if self.db.has_current_sha(name, &sha) {
                summary.files_skipped += 1;
                skipped_since_log += 1;
                if skipped_since_log >= 1000 {
                    tracing::info!(skipped = summary.files_skipped, "skip progress");
                    skipped_since_log = 0;
                }
                continue;
            }

            let modified = meta.modified().map(chrono::DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            let fe = FileEntry {
                name: name.clone(),
                size,
                modified,
                sha,
            };
            batch_bytes += fe.size;
            batch.push(fe);

            if batch_bytes > self.min_size {
                self.flush(&mut batch, &mut batch_bytes, &mut summary)?;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut batch_bytes, &mut summary)?;
        }

        Ok(summary)
    }

    fn flush(&mut self, batch: &mut Vec<FileEntry>, batch_bytes: &mut u64, summary: &mut PackSummary) -> Result<()> {
        let id = self.ids.next();
        tracing::info!(
            archive = %id,
            files = batch.len(),
            bytes = crate::human_format::human_size(*batch_bytes),
            "flushing archive"
        );

        let tar_path = self.write_tar(&id, batch)?;
        self.store
            .upload(&tar_path, &id.tar_key(), &self.cold_class, self.dry_run)?;

        let manifest = ManifestFile::new(batch.clone());
        self.manifests.write_local(id.as_str(), &manifest)?;

        let manifest_path = self.manifests.cache_dir.join(format!("{id}.json"));
        let warm_class = StorageClass::new("STANDARD");
        self.store
            .upload(&manifest_path, &id.manifest_key(), &warm_class, self.dry_run)?;

        summary.archives_written += 1;
        summary.files_packed += batch.len();
        summary.bytes_packed += *batch_bytes;

        batch.clear();
        *batch_bytes = 0;
        Ok(())
    }

    fn write_tar(&self, id: &ArchiveId, entries: &[FileEntry]) -> Result<std::path::PathBuf> {
        let tmp = tempfile::Builder::new()
            .prefix(&format!("{id}-"))
            .suffix(".tar")
            .tempfile()?;
        let (file, path) = tmp.keep().map_err(|e| crate::error::BackupError::Io(e.error))?;
        {
            let mut builder = tar::Builder::new(file);
            for fe in entries {
                self.append_entry(&mut builder, fe)?;
            }
            builder.finish()?;
        }
        Ok(path)
    }

    fn append_entry<W: std::io::Write>(&self, builder: &mut tar::Builder<W>, fe: &FileEntry) -> Result<()> {
        let path = self.indir.join(&fe.name);
        let meta = std::fs::symlink_metadata(&path)?;

        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&path)?;
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder.append_link(&mut header, &fe.name, &target)?;
        } else {
            let mut file = std::fs::File::open(&path)?;
            let mut header = tar::Header::new_gnu();
            header.set_size(fe.size);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, &fe.name, &mut file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectstore::mock::MockObjectStore;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, content: &[u8]) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn empty_tree_packs_nothing() {
        let indir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = MockObjectStore::new();
        let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
        let db = BackupDatabase::new();

        let mut packer = Packer::new(
            indir.path().to_path_buf(),
            StorageClass::new("DEEP_ARCHIVE"),
            1,
            false,
            &db,
            &store,
            &manifests,
        );
        let summary = packer.run(&[]).unwrap();
        assert_eq!(summary.archives_written, 0);
        assert_eq!(store.keys().len(), 0);
    }

    #[test]
    fn single_small_file_produces_one_archive_and_manifest() {
        let indir = tempfile::tempdir().unwrap();
        write_file(indir.path(), "a.txt", b"hello world");
        let cache = tempfile::tempdir().unwrap();
        let store = MockObjectStore::new();
        let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
        let db = BackupDatabase::new();

        let mut packer = Packer::new(
            indir.path().to_path_buf(),
            StorageClass::new("DEEP_ARCHIVE"),
            1,
            false,
            &db,
            &store,
            &manifests,
        );
        let summary = packer.run(&["a.txt".to_string()]).unwrap();
        assert_eq!(summary.archives_written, 1);
        assert_eq!(summary.files_packed, 1);

        let tar_keys: Vec<_> = store.keys().into_iter().filter(|k| k.starts_with("data/")).collect();
        let db_keys: Vec<_> = store.keys().into_iter().filter(|k| k.starts_with("db/")).collect();
        assert_eq!(tar_keys.len(), 1);
        assert_eq!(db_keys.len(), 1);

        let manifest_bytes = store.contents(&db_keys[0]).unwrap();
        let manifest = ManifestFile::from_json(&manifest_bytes).unwrap();
        assert_eq!(manifest.data.len(), 1);
        assert_eq!(manifest.data[0].name, "a.txt");
    }

    #[test]
    fn unchanged_file_is_skipped_on_second_run() {
        let indir = tempfile::tempdir().unwrap();
        write_file(indir.path(), "a.txt", b"hello world");
        let sha = digest_path(&indir.path().join("a.txt")).unwrap();

        let mut db = BackupDatabase::new();
        db.ingest(
            FileEntry {
                name: "a.txt".to_string(),
                size: 11,
                modified: Utc::now(),
                sha,
            },
            ArchiveId::from_raw("prior".to_string()),
        );

        let cache = tempfile::tempdir().unwrap();
        let store = MockObjectStore::new();
        let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);

        let mut packer = Packer::new(
            indir.path().to_path_buf(),
            StorageClass::new("DEEP_ARCHIVE"),
            1,
            false,
            &db,
            &store,
            &manifests,
        );
        let summary = packer.run(&["a.txt".to_string()]).unwrap();
        assert_eq!(summary.archives_written, 0);
        assert_eq!(summary.files_skipped, 1);
    }

    #[test]
    fn archive_ids_strictly_increase_across_flushes() {
        let indir = tempfile::tempdir().unwrap();
        write_file(indir.path(), "a.txt", &vec![0u8; 10]);
        write_file(indir.path(), "b.txt", &vec![1u8; 10]);
        let cache = tempfile::tempdir().unwrap();
        let store = MockObjectStore::new();
        let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
        let db = BackupDatabase::new();

        // min_size of 5 bytes forces a flush after each file.
        let mut packer = Packer::new(
            indir.path().to_path_buf(),
            StorageClass::new("DEEP_ARCHIVE"),
            5,
            false,
            &db,
            &store,
            &manifests,
        );
        let summary = packer.run(&["a.txt".to_string(), "b.txt".to_string()]).unwrap();
        assert_eq!(summary.archives_written, 2);

        let mut db_keys: Vec<_> = store.keys().into_iter().filter(|k| k.starts_with("db/")).collect();
        db_keys.sort();
        assert!(db_keys[0] < db_keys[1]);
    }

    #[test]
    fn dry_run_does_not_write_to_store() {
        let indir = tempfile::tempdir().unwrap();
        write_file(indir.path(), "a.txt", b"hello");
        let cache = tempfile::tempdir().unwrap();
        let store = MockObjectStore::new();
        let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
        let db = BackupDatabase::new();

        let mut packer = Packer::new(
            indir.path().to_path_buf(),
            StorageClass::new("DEEP_ARCHIVE"),
            1,
            true,
            &db,
            &store,
            &manifests,
        );
        packer.run(&["a.txt".to_string()]).unwrap();
        assert!(store.keys().is_empty());
    }
}
