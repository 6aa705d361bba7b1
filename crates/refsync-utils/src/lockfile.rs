use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{LockError, UtilError};
use crate::Result;

/// RAII lock file guard. Creates a `.lock` sidecar on construction,
/// atomically renames it over the target on commit, removes it on drop if
/// not committed.
///
/// The protocol:
/// - Resolve symlinks so the sidecar lands next to the real file
/// - Create `<path>.lock` with O_CREAT|O_EXCL (the mutual-exclusion primitive)
/// - Write new contents to the lock file
/// - Atomically rename `.lock` to the target on commit
/// - Remove `.lock` on drop if not committed (rollback)
///
/// Every successfully acquired lock is tracked in a process-wide registry
/// so that signal delivery releases all sidecars still held by this
/// process before the process dies.
pub struct LockFile {
    /// Registry handle for this lock.
    id: u64,
    /// The target file path (without .lock suffix).
    path: PathBuf,
    /// The lock file path (with .lock suffix).
    lock_path: PathBuf,
    /// The open file handle for writing.
    file: Option<File>,
    /// Whether commit() has been called.
    committed: bool,
}

const LOCK_SUFFIX: &str = ".lock";

/// How many levels of symlink indirection we are willing to follow.
const MAX_SYMLINK_DEPTH: usize = 5;

/// Follow up to [`MAX_SYMLINK_DEPTH`] symlink indirections so the sidecar
/// is created next to the real file rather than the apparent one.
///
/// Best-effort: a path that is not a symlink, an unreadable link, or an
/// over-deep chain leaves the path as it stands at that point.
fn resolve_symlink(mut path: PathBuf) -> PathBuf {
    for _ in 0..MAX_SYMLINK_DEPTH {
        let link = match fs::read_link(&path) {
            Ok(link) => link,
            // not a symlink (any more), or unreadable
            Err(_) => return path,
        };
        if link.is_absolute() {
            path = link;
        } else {
            // relative link: replaces the last element of the path
            path = match path.parent() {
                Some(parent) => parent.join(link),
                None => link,
            };
        }
    }
    path
}

impl LockFile {
    /// Acquire a lock on the given path. Creates `path.lock` using
    /// O_CREAT|O_EXCL after resolving symlinks on the target.
    ///
    /// Fails with [`LockError::AlreadyLocked`] if the sidecar already
    /// exists (another process holds the lock), and with
    /// [`LockError::Create`] on any other filesystem failure.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = resolve_symlink(path.as_ref().to_path_buf());
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true) // O_CREAT|O_EXCL equivalent
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    UtilError::Lock(LockError::AlreadyLocked {
                        path: lock_path.clone(),
                    })
                } else {
                    UtilError::Lock(LockError::Create {
                        path: lock_path.clone(),
                        source: e,
                    })
                }
            })?;

        let id = registry::register(&lock_path, &file);

        Ok(Self {
            id,
            path,
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    /// Try to acquire without blocking. Returns Ok(None) if already locked,
    /// Ok(Some(lockfile)) on success, or Err on other failures.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(path) {
            Ok(lk) => Ok(Some(lk)),
            Err(UtilError::Lock(LockError::AlreadyLocked { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Acquire or terminate the process. For top-level tools where partial
    /// operation is not recoverable; library callers should use
    /// [`LockFile::acquire`] and propagate the error.
    pub fn acquire_or_die(path: impl AsRef<Path>) -> Self {
        match Self::acquire(path.as_ref()) {
            Ok(lk) => lk,
            Err(e) => {
                eprintln!("fatal: {}", e);
                std::process::exit(128);
            }
        }
    }

    /// Get a mutable reference to the underlying file for writing.
    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    /// Get the path of the target file (without .lock).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the path of the lock file (with .lock).
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Commit: close the file and atomically rename .lock to the target.
    ///
    /// The rename is the atomicity boundary: readers see either the old
    /// content or the complete new content, never a partial write. A
    /// failure here must be treated as fatal by the caller, since the
    /// durability of the mutation is unknown.
    pub fn commit(mut self) -> Result<()> {
        let dest = self.path.clone();
        self.finish(&dest)
    }

    /// Commit to a caller-chosen destination instead of the locked target.
    /// Same atomicity guarantee; used when the output should land
    /// somewhere it can be inspected before adoption.
    pub fn commit_to(mut self, dest: impl AsRef<Path>) -> Result<()> {
        self.finish(dest.as_ref())
    }

    fn finish(&mut self, dest: &Path) -> Result<()> {
        // The cleanup handler must not close this descriptor under us
        // while we flush and rename.
        registry::detach_fd(self.id);

        if let Some(ref mut file) = self.file {
            file.flush().map_err(|e| {
                UtilError::Lock(LockError::Commit {
                    path: self.lock_path.clone(),
                    source: e,
                })
            })?;
            file.sync_all().map_err(|e| {
                UtilError::Lock(LockError::Commit {
                    path: self.lock_path.clone(),
                    source: e,
                })
            })?;
        }
        // Drop the file handle before rename
        self.file.take();

        fs::rename(&self.lock_path, dest).map_err(|e| {
            UtilError::Lock(LockError::Commit {
                path: self.lock_path.clone(),
                source: e,
            })
        })?;

        self.committed = true;
        registry::unregister(self.id);
        Ok(())
    }

    /// Rollback: remove the .lock file (also happens on Drop).
    pub fn rollback(mut self) -> Result<()> {
        registry::unregister(self.id);
        self.file.take();
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        self.committed = true; // Prevent Drop from trying to clean up again
        Ok(())
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            registry::unregister(self.id);
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

pub use registry::cleanup_process_locks;

mod registry {
    //! Process-wide table of held locks.
    //!
    //! A single termination handler walks this table and releases every
    //! sidecar owned by the current process id, so an interrupted process
    //! cannot leave stale sidecars that would permanently block future
    //! writers. On non-unix targets no handler is installed and cleanup
    //! degrades to Drop-based rollback only.

    use std::fs::File;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, Once};

    #[cfg(unix)]
    use std::os::unix::io::AsRawFd;

    struct Entry {
        id: u64,
        owner: u32,
        #[cfg(unix)]
        fd: i32,
        #[cfg(unix)]
        c_path: Option<std::ffi::CString>,
        #[cfg(not(unix))]
        path: std::path::PathBuf,
    }

    static LOCKS: Mutex<Vec<Entry>> = Mutex::new(Vec::new());
    static INSTALL: Once = Once::new();
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    pub(super) fn register(lock_path: &Path, file: &File) -> u64 {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            owner: std::process::id(),
            #[cfg(unix)]
            fd: file.as_raw_fd(),
            #[cfg(unix)]
            c_path: {
                use std::os::unix::ffi::OsStrExt;
                std::ffi::CString::new(lock_path.as_os_str().as_bytes()).ok()
            },
            #[cfg(not(unix))]
            path: lock_path.to_path_buf(),
        };
        #[cfg(not(unix))]
        let _ = file;
        if let Ok(mut locks) = LOCKS.lock() {
            locks.push(entry);
        }
        INSTALL.call_once(install_cleanup);
        id
    }

    pub(super) fn unregister(id: u64) {
        if let Ok(mut locks) = LOCKS.lock() {
            locks.retain(|e| e.id != id);
        }
    }

    /// Stop tracking the descriptor of a lock that is mid-commit, so the
    /// cleanup path does not close it behind the committer's back.
    pub(super) fn detach_fd(id: u64) {
        if let Ok(mut locks) = LOCKS.lock() {
            for e in locks.iter_mut() {
                if e.id == id {
                    #[cfg(unix)]
                    {
                        e.fd = -1;
                    }
                }
            }
        }
    }

    /// Close and unlink every sidecar owned by the current process.
    ///
    /// Runs from the signal and exit paths; uses try_lock so a handler
    /// that interrupts a registry update gives up rather than deadlocking.
    /// Best-effort, as the process is about to die either way.
    pub fn cleanup_process_locks() {
        let me = std::process::id();
        let Ok(mut locks) = LOCKS.try_lock() else {
            return;
        };
        locks.retain(|entry| {
            if entry.owner != me {
                return true;
            }
            #[cfg(unix)]
            unsafe {
                if entry.fd >= 0 {
                    libc::close(entry.fd);
                }
                if let Some(p) = &entry.c_path {
                    libc::unlink(p.as_ptr());
                }
            }
            #[cfg(not(unix))]
            {
                let _ = std::fs::remove_file(&entry.path);
            }
            false
        });
    }

    #[cfg(unix)]
    fn install_cleanup() {
        unsafe {
            let handler = handle_signal as extern "C" fn(libc::c_int);
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
            libc::signal(libc::SIGHUP, handler as libc::sighandler_t);
            libc::atexit(cleanup_at_exit);
        }
    }

    #[cfg(not(unix))]
    fn install_cleanup() {}

    #[cfg(unix)]
    extern "C" fn handle_signal(signo: libc::c_int) {
        cleanup_process_locks();
        unsafe {
            libc::signal(signo, libc::SIG_DFL);
            libc::raise(signo);
        }
    }

    #[cfg(unix)]
    extern "C" fn cleanup_at_exit() {
        cleanup_process_locks();
    }
}
