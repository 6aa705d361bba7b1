//! Refspec parsing, ref matching, and remote/branch configuration for the
//! refsync core.
//!
//! The matching engine is pure computation over ref lists supplied by the
//! caller: it decides which source ref updates which destination ref
//! during a push or fetch, and rejects ambiguous or conflicting mappings
//! instead of guessing. Nothing here touches the network or mutates refs;
//! only a fully error-free result set may be handed to transport or to
//! the lock-protected ref writer.

mod config;
mod error;
mod fetch;
mod matching;
mod push;
mod refspec;

pub use config::{Branch, Remote, RemoteRegistry, TagFollow};
pub use error::{MatchError, MatchErrors, RemoteError};
pub use fetch::{dedup_fetch_map, fetch_map, FetchMapping};
pub use matching::{count_refspec_match, ref_matches_abbrev, RefNamed};
pub use push::{match_push_refs, HexResolver, ObjectResolver, PushSource, PushUpdate};
pub use refspec::Refspec;

use refsync_hash::ObjectId;
use refsync_ref::RefFlags;

/// A ref as listed by one side of a sync operation: a name and the object
/// id it currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    pub name: String,
    pub oid: ObjectId,
    pub flags: RefFlags,
}

impl Ref {
    pub fn new(name: impl Into<String>, oid: ObjectId) -> Self {
        Self {
            name: name.into(),
            oid,
            flags: RefFlags::empty(),
        }
    }
}

impl matching::RefNamed for Ref {
    fn ref_name(&self) -> &str {
        &self.name
    }
}
