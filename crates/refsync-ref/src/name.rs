use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::error::RefError;

/// A validated reference name.
///
/// Enforces the check-ref-format rules: no `..`, no control characters,
/// none of ` ~^:?*[\`, no leading or trailing `/` or `.`, no `//`, no
/// `@{`, not the single character `@`, no component starting with `.` or
/// ending with `.lock`. Names without a `/` are only accepted for the
/// special top-level refs (`HEAD` and friends).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(BString);

/// Characters forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[u8] = b" ~^:?*[\\";

/// Top-level pseudo-refs that are valid without a `/`.
const SPECIAL_REFS: &[&str] = &[
    "HEAD",
    "MERGE_HEAD",
    "FETCH_HEAD",
    "ORIG_HEAD",
    "CHERRY_PICK_HEAD",
    "REVERT_HEAD",
];

impl RefName {
    /// Create and validate a ref name.
    pub fn new(name: impl Into<BString>) -> Result<Self, RefError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Get the raw bytes of this ref name.
    pub fn as_bstr(&self) -> &BStr {
        self.0.as_bstr()
    }

    /// Get as a string slice (ref names are valid UTF-8 in practice).
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("<invalid-utf8>")
    }

    /// Is this under `refs/heads/`?
    pub fn is_branch(&self) -> bool {
        self.0.starts_with(b"refs/heads/")
    }

    /// Is this under `refs/tags/`?
    pub fn is_tag(&self) -> bool {
        self.0.starts_with(b"refs/tags/")
    }

    /// Get the inner BString.
    pub fn into_inner(self) -> BString {
        self.0
    }
}

impl AsRef<BStr> for RefName {
    fn as_ref(&self) -> &BStr {
        self.0.as_bstr()
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate(name: &[u8]) -> Result<(), RefError> {
    let bad = |why: &str| {
        Err(RefError::InvalidName(format!(
            "'{}': {}",
            String::from_utf8_lossy(name),
            why
        )))
    };

    if name.is_empty() {
        return bad("empty name");
    }
    if name == b"@" {
        return bad("'@' alone is not a valid ref name");
    }
    if name.starts_with(b"/") || name.ends_with(b"/") {
        return bad("begins or ends with '/'");
    }
    if name.starts_with(b".") || name.ends_with(b".") {
        return bad("begins or ends with '.'");
    }
    if name.find(b"//").is_some() {
        return bad("contains '//'");
    }
    if name.find(b"..").is_some() {
        return bad("contains '..'");
    }
    if name.find(b"@{").is_some() {
        return bad("contains '@{'");
    }
    for &b in name {
        if b < 0x20 || b == 0x7f {
            return bad("contains a control character");
        }
        if FORBIDDEN_CHARS.contains(&b) {
            return bad("contains a forbidden character");
        }
    }
    for component in name.split_str(b"/") {
        if component.starts_with(b".") {
            return bad("component begins with '.'");
        }
        if component.ends_with(b".lock") {
            return bad("component ends with '.lock'");
        }
    }
    if !name.contains(&b'/') {
        let top = String::from_utf8_lossy(name);
        if !SPECIAL_REFS.contains(&top.as_ref()) {
            return bad("single-level name is not a known special ref");
        }
    }
    Ok(())
}
