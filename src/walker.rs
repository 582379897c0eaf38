//! Deterministic recursive enumeration of an input tree.

use crate::error::{BackupError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively list every regular file and symlink under `root`, as paths
/// relative to `root` using forward slashes, sorted in byte order.
///
/// Directory symlinks are never followed. Any other special file (socket,
/// FIFO, device) is a fatal error: silently dropping source data is worse
/// than aborting.
pub fn list_files(root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    walk(root, root, &mut out)?;
    out.sort();
    tracing::info!(count = out.len(), "found files");
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        let meta = fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            walk(root, &path, out)?;
        } else if meta.is_file() || meta.file_type().is_symlink() {
            let rel = path.strip_prefix(root).map_err(|_| {
                BackupError::Config(format!(
                    "walked path {} does not start with root {}",
                    path.display(),
                    root.display()
                ))
            })?;
            let rel_str = rel
                .to_str()
                .ok_or_else(|| BackupError::Config(format!("non-UTF-8 path: {}", path.display())))?
                .replace('\\', "/");
            out.push(rel_str);
        } else {
            return Err(BackupError::UnsupportedFileKind {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn lists_nested_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        File::create(dir.path().join("a.txt")).unwrap().write_all(b"1").unwrap();
        File::create(dir.path().join("b/c.txt")).unwrap().write_all(b"2").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.txt".to_string(), "b/c.txt".to_string()]);
    }

    #[test]
    fn empty_tree_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn includes_symlinks_without_following_them() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("real.txt")).unwrap().write_all(b"x").unwrap();
        std::os::unix::fs::symlink("../elsewhere", dir.path().join("link")).unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec!["link".to_string(), "real.txt".to_string()]);
    }
}
