//! Reference naming and storage seam for the refsync core.
//!
//! Provides validated ref names, the enumeration flags reported by ref
//! storage, the read-only [`RefStore`] interface the matching engine
//! consumes, and the lock-protected loose-ref mutation used when a fetch
//! commits its updates locally.

mod error;
mod name;
mod store;
pub mod update;

pub use error::RefError;
pub use name::RefName;
pub use store::{RefFlags, RefStore};
pub use update::{commit_ref, delete_ref};
