use std::fmt;

/// Error types for refspec parsing and remote configuration.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid refspec: {0}")]
    InvalidRefspec(String),

    #[error("refspec '{0}': glob must appear on both sides")]
    GlobMismatch(String),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Ref(#[from] refsync_ref::RefError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single matching failure. Every variant names the offending ref or
/// pattern so the operator can disambiguate with an explicit refspec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("src refspec {0} does not match any")]
    NoSourceMatch(String),

    #[error("src refspec {0} matches more than one")]
    AmbiguousSource(String),

    #[error("dst refspec {0} does not match any existing ref on the remote and does not start with refs/")]
    NoDestinationMatch(String),

    #[error("dst refspec {0} matches more than one")]
    AmbiguousDestination(String),

    #[error("dst ref {0} receives from more than one src")]
    ConflictingBinding(String),

    #[error("refusing to create funny ref '{0}' locally")]
    FunnyRefName(String),

    #[error("couldn't find remote ref {0}")]
    MissingRemoteRef(String),

    #[error("{local} tracks both {a} and {b}")]
    TrackingConflict {
        local: String,
        a: String,
        b: String,
    },
}

/// Every problem found in one matching run, reported together so a single
/// diagnostic pass shows the operator all of them at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchErrors(pub Vec<MatchError>);

impl MatchErrors {
    pub fn iter(&self) -> impl Iterator<Item = &MatchError> {
        self.0.iter()
    }
}

impl fmt::Display for MatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for MatchErrors {}

impl From<MatchError> for MatchErrors {
    fn from(e: MatchError) -> Self {
        Self(vec![e])
    }
}
