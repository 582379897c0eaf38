//! In-memory union of all manifests, keyed by logical file path.

use crate::manifest::{store::ManifestStore, FileEntry};
use crate::types::ArchiveId;
use std::collections::BTreeMap;

/// A [`FileEntry`] plus the manifest id that wrote it and any entries it
/// superseded, most-recent-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEntry {
    pub entry: FileEntry,
    pub manifest_id: ArchiveId,
    pub alt: Vec<DatabaseEntry>,
}

/// The merged view of every manifest synced so far, keyed on [`FileEntry::name`].
///
/// Lookup equality for the dedup decision is by `sha` alone; `modified` is
/// recorded but never consulted, so touch/rsync mtime drift never forces a
/// re-upload.
#[derive(Debug, Default)]
pub struct BackupDatabase {
    entries: BTreeMap<String, DatabaseEntry>,
}

impl BackupDatabase {
    pub fn new() -> Self {
        BackupDatabase::default()
    }

    /// Build a database from manifests already synced locally, reading
    /// them from the cache in ascending (lexicographic) id order so later
    /// manifests correctly supersede earlier ones.
    pub fn from_store(store: &ManifestStore) -> crate::error::Result<Self> {
        let mut db = BackupDatabase::new();
        for (id, manifest) in store.read_all()? {
            let archive_id = ArchiveId::from_raw(id);
            for fe in manifest.data {
                db.ingest(fe, archive_id.clone());
            }
        }
        Ok(db)
    }

    /// Ingest one entry from manifest `manifest_id`. If `name` is already
    /// present, the existing occupant becomes the new front of the `alt`
    /// chain, followed by whatever alternates it already carried — a flat,
    /// most-recent-first list, never a nested one.
    pub fn ingest(&mut self, entry: FileEntry, manifest_id: ArchiveId) {
        let name = entry.name.clone();
        let mut new_entry = DatabaseEntry {
            entry,
            manifest_id,
            alt: Vec::new(),
        };
        if let Some(mut existing) = self.entries.remove(&name) {
            let older = std::mem::take(&mut existing.alt);
            new_entry.alt.push(existing);
            new_entry.alt.extend(older);
        }
        self.entries.insert(name, new_entry);
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseEntry> {
        self.entries.get(name)
    }

    /// Whether `name` is already recorded with exactly this content hash —
    /// the skip decision the `Packer` uses.
    pub fn has_current_sha(&self, name: &str, sha: &str) -> bool {
        self.entries.get(name).map(|e| e.entry.sha == sha).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DatabaseEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, sha: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            size: 1,
            modified: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            sha: sha.to_string(),
        }
    }

    #[test]
    fn first_ingest_becomes_current_with_no_alternates() {
        let mut db = BackupDatabase::new();
        db.ingest(entry("a.txt", "H1"), ArchiveId::from_raw("id0".into()));
        let current = db.get("a.txt").unwrap();
        assert_eq!(current.entry.sha, "H1");
        assert!(current.alt.is_empty());
    }

    #[test]
    fn second_ingest_supersedes_and_chains_alternate() {
        let mut db = BackupDatabase::new();
        db.ingest(entry("a.txt", "H1"), ArchiveId::from_raw("id0".into()));
        db.ingest(entry("a.txt", "H2"), ArchiveId::from_raw("id1".into()));

        let current = db.get("a.txt").unwrap();
        assert_eq!(current.entry.sha, "H2");
        assert_eq!(current.alt.len(), 1);
        assert_eq!(current.alt[0].entry.sha, "H1");
    }

    #[test]
    fn three_generations_flatten_into_one_alt_list() {
        let mut db = BackupDatabase::new();
        db.ingest(entry("a.txt", "H1"), ArchiveId::from_raw("id0".into()));
        db.ingest(entry("a.txt", "H2"), ArchiveId::from_raw("id1".into()));
        db.ingest(entry("a.txt", "H3"), ArchiveId::from_raw("id2".into()));

        let current = db.get("a.txt").unwrap();
        assert_eq!(current.entry.sha, "H3");
        assert_eq!(current.alt.len(), 2);
        assert_eq!(current.alt[0].entry.sha, "H2");
        assert_eq!(current.alt[1].entry.sha, "H1");
        assert!(current.alt[0].alt.is_empty());
        assert!(current.alt[1].alt.is_empty());
    }

    #[test]
    fn skip_decision_is_sha_only() {
        let mut db = BackupDatabase::new();
        db.ingest(entry("a.txt", "H1"), ArchiveId::from_raw("id0".into()));
        assert!(db.has_current_sha("a.txt", "H1"));
        assert!(!db.has_current_sha("a.txt", "H2"));
        assert!(!db.has_current_sha("missing.txt", "H1"));
    }
}
