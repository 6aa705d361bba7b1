//! Push-side ref matching.
//!
//! Refspec matching rules for push and fetch are subtly different; do not
//! reuse this for fetch.

use std::collections::HashSet;

use refsync_hash::ObjectId;

use crate::error::{MatchError, MatchErrors};
use crate::matching::{count_refspec_match, RefNamed};
use crate::refspec::Refspec;
use crate::Ref;

/// Resolves object-id expressions appearing where a refspec source would
/// normally name a ref (pushing a detached id). Backed by the object
/// store's name resolution.
pub trait ObjectResolver {
    fn resolve(&self, expr: &str) -> Option<ObjectId>;
}

/// Resolver for callers with no object store at hand: accepts full hex
/// ids only.
pub struct HexResolver;

impl ObjectResolver for HexResolver {
    fn resolve(&self, expr: &str) -> Option<ObjectId> {
        ObjectId::from_hex(expr).ok()
    }
}

/// Where a push update's new value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSource {
    /// Index into the local ref list given to [`match_push_refs`].
    Local(usize),
    /// An explicit object-id expression from the refspec.
    Object { expr: String, oid: ObjectId },
    /// Empty source: delete the destination.
    Delete,
}

/// One (source, destination, force) triple produced by push matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushUpdate {
    /// Full name of the destination ref on the remote.
    pub dst_name: String,
    /// The remote's current value; null when the ref is being created.
    pub old_oid: ObjectId,
    /// Where the new value comes from.
    pub src: PushSource,
    /// Allow a non-fast-forward update.
    pub force: bool,
    /// The destination did not exist on the remote.
    pub created: bool,
}

impl PushUpdate {
    /// The value the destination should take: the source ref's id, the
    /// explicit id, or the all-zero id for a deletion.
    pub fn new_oid(&self, local: &[Ref]) -> ObjectId {
        match &self.src {
            PushSource::Local(i) => local[*i].oid,
            PushSource::Object { oid, .. } => *oid,
            PushSource::Delete => ObjectId::NULL,
        }
    }

    /// Is this update a deletion?
    pub fn is_delete(&self) -> bool {
        matches!(self.src, PushSource::Delete)
    }
}

/// Working entry for the destination side. Starts as a copy of the remote
/// listing and grows as rules synthesize creations, so later rules can
/// see (and conflict with) destinations earlier rules created.
struct DstEntry {
    name: String,
    old_oid: ObjectId,
    peer: Option<PushSource>,
    force: bool,
    created: bool,
}

impl RefNamed for DstEntry {
    fn ref_name(&self) -> &str {
        &self.name
    }
}

/// Compute the push mapping: which local source updates which remote
/// destination.
///
/// Explicit (non-pattern) rules are resolved first, and every rule is
/// evaluated before failing so one run reports all problems. Afterwards,
/// unbound sources are offered to the pattern rules (first matching rule
/// wins); with no rules at all only `refs/heads/` sources are offered,
/// and a destination missing from the remote is only created when a
/// pattern rule or the `all` flag sanctions it.
///
/// Pure computation: nothing is sent or written. Only an error-free
/// result may be applied.
pub fn match_push_refs(
    local: &[Ref],
    remote: &[Ref],
    specs: &[Refspec],
    all: bool,
    resolver: &dyn ObjectResolver,
) -> Result<Vec<PushUpdate>, MatchErrors> {
    let mut dst: Vec<DstEntry> = remote
        .iter()
        .map(|r| DstEntry {
            name: r.name.clone(),
            old_oid: r.oid,
            peer: None,
            force: false,
            created: false,
        })
        .collect();
    let mut bound_sources: HashSet<usize> = HashSet::new();
    let mut errs = Vec::new();

    for rs in specs.iter().filter(|rs| !rs.pattern) {
        match_explicit(local, &mut dst, &mut bound_sources, rs, resolver, &mut errs);
    }
    if !errs.is_empty() {
        return Err(MatchErrors(errs));
    }

    // pick the remainder
    for (si, src) in local.iter().enumerate() {
        if bound_sources.contains(&si) {
            continue;
        }

        let pat = if !specs.is_empty() {
            match specs
                .iter()
                .find(|rs| rs.pattern && src.name.starts_with(&rs.src))
            {
                Some(p) => Some(p),
                None => continue,
            }
        } else if !src.name.starts_with("refs/heads/") {
            // "matching refs" without rules stays inside the heads
            // namespace; publishing anything else needs an explicit rule.
            continue;
        } else {
            None
        };

        let dst_name = match pat {
            Some(p) => {
                let side = p.dst.as_deref().unwrap_or(&p.src);
                format!("{}{}", side, &src.name[p.src.len()..])
            }
            None => src.name.clone(),
        };

        let existing = dst.iter().position(|d| d.name == dst_name);
        if let Some(i) = existing {
            if dst[i].peer.is_some() {
                // already sending something to this ref
                continue;
            }
        } else if specs.is_empty() && !all {
            // remote doesn't have it, no rule and no "everything" flag
            continue;
        }

        let i = match existing {
            Some(i) => i,
            None => {
                dst.push(DstEntry {
                    name: dst_name,
                    old_oid: ObjectId::NULL,
                    peer: None,
                    force: false,
                    created: true,
                });
                dst.len() - 1
            }
        };
        dst[i].peer = Some(PushSource::Local(si));
        if let Some(p) = pat {
            dst[i].force = p.force;
        }
    }

    Ok(dst
        .into_iter()
        .filter_map(|d| {
            d.peer.map(|src| PushUpdate {
                dst_name: d.name,
                old_oid: d.old_oid,
                src,
                force: d.force,
                created: d.created,
            })
        })
        .collect())
}

/// Resolve one explicit rule against the two ref sets, recording errors
/// rather than aborting so the caller can report them all.
fn match_explicit(
    local: &[Ref],
    dst: &mut Vec<DstEntry>,
    bound_sources: &mut HashSet<usize>,
    rs: &Refspec,
    resolver: &dyn ObjectResolver,
    errs: &mut Vec<MatchError>,
) {
    let src = match count_refspec_match(&rs.src, local) {
        (1, Some(i)) => Some(PushSource::Local(i)),
        (0, _) => {
            // The source may be an object-id expression rather than a
            // ref name; an empty source deletes the destination.
            if rs.src.is_empty() {
                Some(PushSource::Delete)
            } else if let Some(oid) = resolver.resolve(&rs.src) {
                Some(PushSource::Object {
                    expr: rs.src.clone(),
                    oid,
                })
            } else {
                errs.push(MatchError::NoSourceMatch(rs.src.clone()));
                None
            }
        }
        _ => {
            errs.push(MatchError::AmbiguousSource(rs.src.clone()));
            None
        }
    };

    let dst_value: String = match &rs.dst {
        Some(d) => d.clone(),
        None => match &src {
            Some(PushSource::Local(i)) => local[*i].name.clone(),
            Some(PushSource::Object { expr, .. }) => expr.clone(),
            Some(PushSource::Delete) => "(delete)".to_string(),
            None => return,
        },
    };

    let matched_dst = match count_refspec_match(&dst_value, dst) {
        (1, i) => i,
        (0, _) => {
            if dst_value.starts_with("refs/") {
                // the rule asks for a ref the remote doesn't have yet
                dst.push(DstEntry {
                    name: dst_value.clone(),
                    old_oid: ObjectId::NULL,
                    peer: None,
                    force: false,
                    created: true,
                });
                Some(dst.len() - 1)
            } else {
                errs.push(MatchError::NoDestinationMatch(dst_value.clone()));
                None
            }
        }
        _ => {
            errs.push(MatchError::AmbiguousDestination(dst_value.clone()));
            None
        }
    };

    let (Some(src), Some(di)) = (src, matched_dst) else {
        return;
    };
    let entry = &mut dst[di];
    if entry.peer.is_some() {
        errs.push(MatchError::ConflictingBinding(entry.name.clone()));
        return;
    }
    if let PushSource::Local(i) = src {
        bound_sources.insert(i);
    }
    entry.peer = Some(src);
    entry.force = rs.force;
}
