//! Fetch-side ref matching: turning a remote ref listing into the set of
//! local tracking refs to update.

use std::collections::HashMap;

use refsync_hash::ObjectId;
use refsync_ref::RefName;

use crate::error::{MatchError, RemoteError};
use crate::matching::ref_matches_abbrev;
use crate::refspec::Refspec;
use crate::Ref;

/// One remote-to-local mapping produced by fetch matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMapping {
    /// Full name of the ref on the remote.
    pub remote_name: String,
    /// The value the remote advertises for it.
    pub oid: ObjectId,
    /// Local ref to update; None fetches the object without updating any
    /// local ref (FETCH_HEAD-style).
    pub local_name: Option<String>,
    /// Allow a non-fast-forward update of the local ref.
    pub force: bool,
}

/// Expand one fetch refspec against a remote ref listing.
///
/// Pattern rules copy every matching remote ref with a synthesized local
/// name (source prefix replaced by destination prefix). Non-pattern rules
/// locate a single remote ref by abbreviation, with an empty source
/// defaulting to `HEAD`; absence is an error unless `missing_ok`.
///
/// Every synthesized local name must be a well-formed ref name; anything
/// else is rejected rather than sanitized.
pub fn fetch_map(
    remote_refs: &[Ref],
    spec: &Refspec,
    missing_ok: bool,
) -> Result<Vec<FetchMapping>, RemoteError> {
    let map = if spec.pattern {
        expanded_map(remote_refs, spec)
    } else {
        let name: &str = if spec.src.is_empty() { "HEAD" } else { &spec.src };
        match remote_refs
            .iter()
            .find(|r| ref_matches_abbrev(name, &r.name))
        {
            Some(r) => vec![FetchMapping {
                remote_name: r.name.clone(),
                oid: r.oid,
                local_name: local_ref_name(spec.dst.as_deref()),
                force: spec.force,
            }],
            None if missing_ok => Vec::new(),
            None => return Err(MatchError::MissingRemoteRef(name.to_string()).into()),
        }
    };

    for m in &map {
        if let Some(local) = &m.local_name {
            if RefName::new(local.as_str()).is_err() {
                return Err(MatchError::FunnyRefName(local.clone()).into());
            }
        }
    }

    Ok(map)
}

fn expanded_map(remote_refs: &[Ref], spec: &Refspec) -> Vec<FetchMapping> {
    remote_refs
        .iter()
        // a '^' entry is a tag's peeled target, metadata rather than a ref
        .filter(|r| !r.name.contains('^'))
        .filter_map(|r| {
            let rest = r.name.strip_prefix(spec.src.as_str())?;
            Some(FetchMapping {
                remote_name: r.name.clone(),
                oid: r.oid,
                local_name: spec.dst.as_ref().map(|d| format!("{d}{rest}")),
                force: spec.force,
            })
        })
        .collect()
}

/// Expand an abbreviated local destination: `heads/…`, `tags/…` and
/// `remotes/…` gain `refs/`, a bare name gains `refs/heads/`, a full
/// `refs/…` name passes through.
fn local_ref_name(name: Option<&str>) -> Option<String> {
    let name = name?;
    if name.starts_with("refs/") {
        Some(name.to_string())
    } else if name.starts_with("heads/")
        || name.starts_with("tags/")
        || name.starts_with("remotes/")
    {
        Some(format!("refs/{name}"))
    } else {
        Some(format!("refs/heads/{name}"))
    }
}

/// Drop mappings that agree with an earlier one on both sides; reject a
/// local name bound to two different remote refs.
pub fn dedup_fetch_map(map: Vec<FetchMapping>) -> Result<Vec<FetchMapping>, RemoteError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut out = Vec::with_capacity(map.len());
    for m in map {
        let Some(local) = m.local_name.clone() else {
            out.push(m);
            continue;
        };
        match seen.get(&local) {
            Some(prev) if *prev == m.remote_name => continue,
            Some(prev) => {
                return Err(MatchError::TrackingConflict {
                    local,
                    a: prev.clone(),
                    b: m.remote_name,
                }
                .into())
            }
            None => {
                seen.insert(local, m.remote_name.clone());
                out.push(m);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes(&[byte; 20]).unwrap()
    }

    fn remote() -> Vec<Ref> {
        vec![
            Ref::new("HEAD", oid(1)),
            Ref::new("refs/heads/main", oid(1)),
            Ref::new("refs/heads/dev", oid(2)),
            Ref::new("refs/tags/v1", oid(3)),
            Ref::new("refs/tags/v1^{}", oid(4)),
        ]
    }

    #[test]
    fn pattern_expansion() {
        let spec = Refspec::parse("+refs/heads/*:refs/remotes/origin/*").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].local_name.as_deref(), Some("refs/remotes/origin/main"));
        assert_eq!(map[1].local_name.as_deref(), Some("refs/remotes/origin/dev"));
        assert!(map.iter().all(|m| m.force));
    }

    #[test]
    fn peeled_entries_are_skipped() {
        let spec = Refspec::parse("refs/tags/*:refs/tags/*").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].remote_name, "refs/tags/v1");
    }

    #[test]
    fn single_ref_by_abbrev() {
        let spec = Refspec::parse("main:refs/remotes/origin/main").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].remote_name, "refs/heads/main");
        assert_eq!(map[0].oid, oid(1));
    }

    #[test]
    fn empty_source_means_head() {
        let spec = Refspec::parse(":refs/heads/from-head").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].remote_name, "HEAD");
        assert_eq!(map[0].local_name.as_deref(), Some("refs/heads/from-head"));
    }

    #[test]
    fn missing_ref_is_fatal_unless_allowed() {
        let spec = Refspec::parse("refs/heads/nope:refs/remotes/origin/nope").unwrap();
        assert!(matches!(
            fetch_map(&remote(), &spec, false),
            Err(RemoteError::Match(MatchError::MissingRemoteRef(_)))
        ));
        assert!(fetch_map(&remote(), &spec, true).unwrap().is_empty());
    }

    #[test]
    fn local_abbreviations_expand() {
        let spec = Refspec::parse("refs/heads/main:local").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map[0].local_name.as_deref(), Some("refs/heads/local"));

        let spec = Refspec::parse("refs/heads/main:tags/snapshot").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map[0].local_name.as_deref(), Some("refs/tags/snapshot"));
    }

    #[test]
    fn no_destination_fetches_without_local_ref() {
        let spec = Refspec::parse("refs/heads/main").unwrap();
        let map = fetch_map(&remote(), &spec, false).unwrap();
        assert_eq!(map[0].local_name, None);
    }

    #[test]
    fn funny_local_name_is_rejected() {
        let refs = vec![Ref::new("refs/heads/bad..name", oid(9))];
        let spec = Refspec::parse("refs/heads/*:refs/remotes/origin/*").unwrap();
        assert!(matches!(
            fetch_map(&refs, &spec, false),
            Err(RemoteError::Match(MatchError::FunnyRefName(_)))
        ));
    }

    #[test]
    fn dedup_drops_agreeing_duplicates() {
        let m = FetchMapping {
            remote_name: "refs/heads/main".into(),
            oid: oid(1),
            local_name: Some("refs/remotes/origin/main".into()),
            force: false,
        };
        let out = dedup_fetch_map(vec![m.clone(), m.clone()]).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn dedup_rejects_conflicting_sources() {
        let a = FetchMapping {
            remote_name: "refs/heads/main".into(),
            oid: oid(1),
            local_name: Some("refs/remotes/origin/x".into()),
            force: false,
        };
        let b = FetchMapping {
            remote_name: "refs/heads/dev".into(),
            oid: oid(2),
            local_name: Some("refs/remotes/origin/x".into()),
            force: false,
        };
        assert!(matches!(
            dedup_fetch_map(vec![a, b]),
            Err(RemoteError::Match(MatchError::TrackingConflict { .. }))
        ));
    }
}
