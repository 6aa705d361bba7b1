//! Lock-protected loose-ref mutation.
//!
//! The fetch path commits each local ref update through these functions;
//! the lock sidecar makes every mutation a single-writer critical section
//! for that ref file, and the rename on commit keeps readers from ever
//! seeing a half-written ref.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use refsync_hash::ObjectId;
use refsync_utils::LockFile;

use crate::error::RefError;
use crate::name::RefName;

/// Path of the loose file backing a ref.
pub fn ref_path(git_dir: &Path, name: &RefName) -> PathBuf {
    git_dir.join(name.as_str())
}

/// Atomically set a ref to the given object id, creating it if needed.
pub fn commit_ref(git_dir: &Path, name: &RefName, oid: ObjectId) -> Result<(), RefError> {
    let path = ref_path(git_dir, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut lock = LockFile::acquire(&path)?;
    writeln!(lock, "{}", oid).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;
    lock.commit()?;
    Ok(())
}

/// Delete a loose ref file, pruning directories left empty under `refs/`.
pub fn delete_ref(git_dir: &Path, name: &RefName) -> Result<(), RefError> {
    let path = ref_path(git_dir, name);
    if !path.exists() {
        return Ok(());
    }
    fs::remove_file(&path).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;

    let refs_dir = git_dir.join("refs");
    let mut dir = path.parent().map(|p| p.to_path_buf());
    while let Some(d) = dir {
        if d == refs_dir || d == *git_dir {
            break;
        }
        // stop at the first non-empty directory
        if fs::remove_dir(&d).is_err() {
            break;
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn commit_creates_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::new("refs/heads/main").unwrap();

        commit_ref(dir.path(), &name, oid(0xaa)).unwrap();
        let content = fs::read_to_string(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(content, format!("{}\n", oid(0xaa)));

        commit_ref(dir.path(), &name, oid(0xbb)).unwrap();
        let content = fs::read_to_string(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(content, format!("{}\n", oid(0xbb)));

        // no sidecar left behind
        assert!(!dir.path().join("refs/heads/main.lock").exists());
    }

    #[test]
    fn delete_prunes_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::new("refs/heads/feature/deep").unwrap();

        commit_ref(dir.path(), &name, oid(0x11)).unwrap();
        assert!(dir.path().join("refs/heads/feature/deep").exists());

        delete_ref(dir.path(), &name).unwrap();
        assert!(!dir.path().join("refs/heads/feature").exists());
        assert!(dir.path().join("refs").exists());
    }

    #[test]
    fn delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::new("refs/heads/nope").unwrap();
        delete_ref(dir.path(), &name).unwrap();
    }

    #[test]
    fn concurrent_writer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::new("refs/heads/main").unwrap();
        commit_ref(dir.path(), &name, oid(0x11)).unwrap();

        let _held = LockFile::acquire(ref_path(dir.path(), &name)).unwrap();
        assert!(commit_ref(dir.path(), &name, oid(0x22)).is_err());

        // the held lock still protects the original value
        let content = fs::read_to_string(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(content, format!("{}\n", oid(0x11)));
    }
}
