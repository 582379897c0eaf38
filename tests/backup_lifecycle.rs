use permafrost::database::BackupDatabase;
use permafrost::manifest::store::ManifestStore;
use permafrost::objectstore::mock::MockObjectStore;
use permafrost::objectstore::StorageClass;
use permafrost::packer::Packer;
use permafrost::report::render_csv;
use permafrost::walker::list_files;
use std::path::Path;
use tempfile::TempDir;

fn get_temp_dir() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn run_backup(indir: &Path, store: &MockObjectStore, cache: &Path, min_size: u64) -> permafrost::packer::PackSummary {
    let manifests = ManifestStore::new(cache.to_path_buf(), store);
    manifests.sync().unwrap();
    let db = BackupDatabase::from_store(&manifests).unwrap();
    let files = list_files(indir).unwrap();
    let mut packer = Packer::new(
        indir.to_path_buf(),
        StorageClass::new("DEEP_ARCHIVE"),
        min_size,
        false,
        &db,
        store,
        &manifests,
    );
    packer.run(&files).unwrap()
}

#[test]
fn invariant_second_run_over_unchanged_tree_skips_everything() {
    let indir = get_temp_dir();
    write_file(indir.path(), "a.txt", b"stable content");
    write_file(indir.path(), "nested/b.txt", b"also stable");

    let store = MockObjectStore::new();
    let cache = get_temp_dir();

    let first = run_backup(indir.path(), &store, cache.path(), 1);
    assert_eq!(first.archives_written, 1);
    assert_eq!(first.files_packed, 2);

    let second = run_backup(indir.path(), &store, cache.path(), 1);
    assert_eq!(second.archives_written, 0);
    assert_eq!(second.files_skipped, 2);
}

#[test]
fn invariant_changed_file_supersedes_without_losing_the_alternate() {
    let indir = get_temp_dir();
    write_file(indir.path(), "a.txt", b"version one");

    let store = MockObjectStore::new();
    let cache = get_temp_dir();
    run_backup(indir.path(), &store, cache.path(), 1);

    write_file(indir.path(), "a.txt", b"version two, longer");
    let second = run_backup(indir.path(), &store, cache.path(), 1);
    assert_eq!(second.archives_written, 1);
    assert_eq!(second.files_packed, 1);

    let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
    let db = BackupDatabase::from_store(&manifests).unwrap();
    let current = db.get("a.txt").unwrap();
    assert_eq!(current.alt.len(), 1);
    assert_ne!(current.entry.sha, current.alt[0].entry.sha);
}

#[test]
fn invariant_archive_contains_every_manifest_member_at_the_recorded_size() {
    let indir = get_temp_dir();
    write_file(indir.path(), "a.txt", b"12345");
    write_file(indir.path(), "b.txt", b"67890abc");

    let store = MockObjectStore::new();
    let cache = get_temp_dir();
    run_backup(indir.path(), &store, cache.path(), 1);

    let db_key = store.keys().into_iter().find(|k| k.starts_with("db/")).unwrap();
    let tar_key = db_key.replace("db/", "data/").replace(".json", ".tar");

    let manifest_bytes = store.contents(&db_key).unwrap();
    let manifest = permafrost::manifest::ManifestFile::from_json(&manifest_bytes).unwrap();

    let tar_bytes = store.contents(&tar_key).unwrap();
    let mut archive = tar::Archive::new(tar_bytes.as_slice());
    let mut sizes = std::collections::HashMap::new();
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().to_string();
        sizes.insert(path, entry.header().size().unwrap());
    }

    for fe in &manifest.data {
        assert_eq!(sizes.get(&fe.name), Some(&fe.size));
    }
}

#[cfg(unix)]
#[test]
fn invariant_symlink_hash_is_of_the_target_text() {
    let indir = get_temp_dir();
    write_file(indir.path(), "real.txt", b"x");
    std::os::unix::fs::symlink("../elsewhere", indir.path().join("link")).unwrap();

    let store = MockObjectStore::new();
    let cache = get_temp_dir();
    run_backup(indir.path(), &store, cache.path(), 1);

    let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
    let db = BackupDatabase::from_store(&manifests).unwrap();
    let link_entry = db.get("link").unwrap();

    let expected = permafrost::digest::digest_path(&indir.path().join("link")).unwrap();
    assert_eq!(link_entry.entry.sha, expected);
}

#[test]
fn golden_csv_has_one_row_per_current_entry() {
    let indir = get_temp_dir();
    write_file(indir.path(), "a.txt", b"one");
    write_file(indir.path(), "b.txt", b"two");

    let store = MockObjectStore::new();
    let cache = get_temp_dir();
    run_backup(indir.path(), &store, cache.path(), 1);

    let manifests = ManifestStore::new(cache.path().to_path_buf(), &store);
    let db = BackupDatabase::from_store(&manifests).unwrap();
    let csv = String::from_utf8(render_csv(&db).unwrap()).unwrap();

    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("\"a.txt\""));
    assert!(csv.contains("\"b.txt\""));
}
