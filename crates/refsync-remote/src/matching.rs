//! Shared name-matching primitives for push and fetch.

/// Anything carrying a full ref name. Lets the same matcher run over the
/// caller's ref lists and the engine's working destination set.
pub trait RefNamed {
    fn ref_name(&self) -> &str;
}

/// Count how many refs a (possibly abbreviated) name matches, and which.
///
/// A name matches a ref when the ref's full name ends with it, either as
/// the whole name or immediately after a `/`.
///
/// A match is *weak* if it is with refs outside `refs/heads/` and
/// `refs/tags/` and did not spell the name in full (or at least from the
/// `refs/` top level); otherwise pushing a short name like `master` would
/// be ambiguous between `refs/heads/master` and
/// `refs/remotes/origin/master`. One strong match with any number of weak
/// matches is a unique match; only when no strong match exists do the
/// weak ones count, and multiple survivors of either kind are ambiguous.
///
/// Returns the count of whichever kind prevailed and the index of the
/// last such match.
pub fn count_refspec_match<T: RefNamed>(pattern: &str, refs: &[T]) -> (usize, Option<usize>) {
    let patlen = pattern.len();
    let mut strong = 0usize;
    let mut strong_idx = None;
    let mut weak = 0usize;
    let mut weak_idx = None;

    for (i, r) in refs.iter().enumerate() {
        let name = r.ref_name();
        let namelen = name.len();
        if !name.ends_with(pattern) {
            continue;
        }
        if namelen != patlen && name.as_bytes()[namelen - patlen - 1] != b'/' {
            continue;
        }

        if namelen != patlen
            && patlen != namelen.saturating_sub(5)
            && !name.starts_with("refs/heads/")
            && !name.starts_with("refs/tags/")
        {
            weak += 1;
            weak_idx = Some(i);
        } else {
            strong += 1;
            strong_idx = Some(i);
        }
    }

    if strong > 0 {
        (strong, strong_idx)
    } else {
        (weak, weak_idx)
    }
}

/// True if, under the matching rules for fetching, `name` abbreviates the
/// full ref name `full`.
pub fn ref_matches_abbrev(name: &str, full: &str) -> bool {
    if name.starts_with("refs/") || name == "HEAD" {
        return name == full;
    }
    let Some(rest) = full.strip_prefix("refs/") else {
        return false;
    };
    if name.starts_with("heads/") || name.starts_with("tags/") || name.starts_with("remotes/") {
        return name == rest;
    }
    match rest.strip_prefix("heads/") {
        Some(branch) => branch == name,
        None => false,
    }
}
