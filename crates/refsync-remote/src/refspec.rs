use crate::error::RemoteError;

/// An immutable refspec rule mapping source ref names to destination ref
/// names.
///
/// For pattern rules, `src` and `dst` hold the literal prefix before the
/// `*`: `refs/heads/*` matches every ref strictly under `refs/heads/`,
/// and expansion replaces the source prefix with the destination prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refspec {
    /// Allow non-fast-forward updates (leading `+`).
    pub force: bool,
    /// True if the rule carries a `*` glob.
    pub pattern: bool,
    /// Source side. Empty means "delete the destination".
    pub src: String,
    /// Destination side; None means the rule did not name one.
    pub dst: Option<String>,
}

impl Refspec {
    /// Parse a single refspec string like `+refs/heads/*:refs/remotes/origin/*`.
    ///
    /// A `*` on only one of two given sides is rejected: a globbed source
    /// with a literal destination (or the reverse) is a configuration
    /// error, not a literal name.
    pub fn parse(spec: &str) -> Result<Self, RemoteError> {
        if spec.is_empty() {
            return Err(RemoteError::InvalidRefspec("empty refspec".into()));
        }

        let (force, rest) = match spec.strip_prefix('+') {
            Some(r) => (true, r),
            None => (false, spec),
        };

        let (src_part, dst_part) = match rest.find(':') {
            Some(i) => (&rest[..i], Some(&rest[i + 1..])),
            None => (rest, None),
        };

        let src_glob = src_part.find('*');
        let dst_glob = dst_part.and_then(|d| d.find('*'));

        let pattern = match (src_glob, dst_part) {
            (Some(_), Some(d)) if !d.is_empty() && dst_glob.is_none() => {
                return Err(RemoteError::GlobMismatch(spec.to_string()));
            }
            (Some(_), _) => true,
            (None, Some(d)) if d.contains('*') => {
                return Err(RemoteError::GlobMismatch(spec.to_string()));
            }
            (None, _) => false,
        };

        let src = match src_glob {
            Some(i) => src_part[..i].to_string(),
            None => src_part.to_string(),
        };
        let dst = match dst_part {
            None | Some("") => None,
            Some(d) => Some(match dst_glob {
                Some(i) => d[..i].to_string(),
                None => d.to_string(),
            }),
        };

        Ok(Self {
            force,
            pattern,
            src,
            dst,
        })
    }

    /// Parse a batch of rules. A malformed rule does not abort its
    /// siblings; the failures are returned alongside the good rules.
    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> (Vec<Refspec>, Vec<(String, RemoteError)>) {
        let mut parsed = Vec::with_capacity(specs.len());
        let mut failed = Vec::new();
        for s in specs {
            match Self::parse(s.as_ref()) {
                Ok(rs) => parsed.push(rs),
                Err(e) => failed.push((s.as_ref().to_string(), e)),
            }
        }
        (parsed, failed)
    }

    /// Does this rule's source side cover the given full ref name?
    pub fn matches_src(&self, name: &str) -> bool {
        if self.pattern {
            name.starts_with(&self.src)
        } else {
            self.src == name
        }
    }

    /// Map a matching source name to the destination side, substituting
    /// the globbed remainder for pattern rules. None if the name does not
    /// match or the rule has no destination.
    pub fn expand_dst(&self, name: &str) -> Option<String> {
        let dst = self.dst.as_deref()?;
        if self.pattern {
            name.strip_prefix(self.src.as_str())
                .map(|rest| format!("{dst}{rest}"))
        } else if self.src == name {
            Some(dst.to_string())
        } else {
            None
        }
    }
}
