//! Foundation utilities for the refsync reference core.
//!
//! The centerpiece is the lock-protected mutation protocol ([`LockFile`]):
//! an exclusively-created `.lock` sidecar file that serializes writers to a
//! target path, with atomic rename on commit, rollback on drop, and
//! process-wide release of every held lock when the process is terminated
//! by a signal.

mod error;
pub mod lockfile;

pub use error::{LockError, UtilError};
pub use lockfile::LockFile;

pub type Result<T> = std::result::Result<T, UtilError>;
