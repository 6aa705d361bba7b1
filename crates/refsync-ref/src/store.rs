use refsync_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;

bitflags::bitflags! {
    /// Flags reported when enumerating refs from storage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RefFlags: u8 {
        /// The ref is symbolic (points at another ref).
        const SYMBOLIC = 1 << 0;
        /// The ref lives in the packed ref index rather than a loose file.
        const PACKED = 1 << 1;
        /// Updates to this ref were configured as forced tracking.
        const FORCED = 1 << 2;
    }
}

/// Read-only view of ref storage, consumed by the matching engine and the
/// configuration model. Backed externally by loose + packed ref storage.
pub trait RefStore {
    /// Enumerate all refs, sorted by full name.
    fn enumerate(&self) -> Result<Vec<(RefName, ObjectId, RefFlags)>, RefError>;

    /// Resolve a possibly-symbolic ref to its final target, or None if the
    /// ref does not exist.
    fn resolve_symbolic(
        &self,
        name: &RefName,
    ) -> Result<Option<(RefName, ObjectId, RefFlags)>, RefError>;
}
