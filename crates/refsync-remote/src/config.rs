//! Remote and branch configuration model.
//!
//! A name-keyed registry built incrementally from `(key, value)` pairs
//! supplied by an external configuration reader, with legacy descriptor
//! files (`remotes/<name>`, `branches/<name>`) as per-remote fallbacks.
//! The registry is an explicit context object: construct one per
//! operation and pass it where needed, so the matching engine stays pure.

use std::fs;
use std::path::PathBuf;

use crate::error::RemoteError;
use crate::matching::ref_matches_abbrev;
use crate::refspec::Refspec;
use refsync_ref::{RefFlags, RefName, RefStore};

/// Tag auto-following policy for a remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagFollow {
    /// Follow tags that point into the fetched history.
    #[default]
    Auto,
    /// Always fetch all tags (legacy branches-file remotes).
    All,
    /// Never auto-follow (`tagopt = --no-tags`).
    None,
}

/// A configured remote: URLs plus fetch/push rules.
#[derive(Debug, Clone, Default)]
pub struct Remote {
    pub name: String,
    pub urls: Vec<String>,
    /// Raw refspec strings as configured; parsed lazily.
    fetch_raw: Vec<String>,
    push_raw: Vec<String>,
    pub fetch: Vec<Refspec>,
    pub push: Vec<Refspec>,
    pub receivepack: Option<String>,
    pub uploadpack: Option<String>,
    pub fetch_tags: TagFollow,
    parsed: bool,
}

impl Remote {
    /// Does this remote carry the given URL?
    pub fn has_url(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    /// Map a remote ref name to the local tracking ref the fetch rules
    /// would give it.
    pub fn tracking_for(&self, remote_ref: &str) -> Option<Refspec> {
        self.find_tracking(remote_ref, false)
    }

    /// Map a local tracking ref back to the remote ref it tracks.
    pub fn tracking_source_of(&self, local_ref: &str) -> Option<Refspec> {
        self.find_tracking(local_ref, true)
    }

    /// Find the first fetch rule whose known side matches `needle` and
    /// synthesize the missing side, using the same prefix substitution as
    /// fetch expansion. The returned rule is fully concrete (non-pattern)
    /// and carries the fetch rule's force flag.
    fn find_tracking(&self, needle: &str, find_src: bool) -> Option<Refspec> {
        for rule in &self.fetch {
            let Some(dst) = rule.dst.as_deref() else {
                continue;
            };
            let (key, value) = if find_src {
                (dst, rule.src.as_str())
            } else {
                (rule.src.as_str(), dst)
            };
            let other = if rule.pattern {
                needle
                    .strip_prefix(key)
                    .map(|rest| format!("{value}{rest}"))
            } else if key == needle {
                Some(value.to_string())
            } else {
                None
            };
            if let Some(other) = other {
                let (src, dst) = if find_src {
                    (other, needle.to_string())
                } else {
                    (needle.to_string(), other)
                };
                return Some(Refspec {
                    force: rule.force,
                    pattern: false,
                    src,
                    dst: Some(dst),
                });
            }
        }
        None
    }
}

/// A configured branch and its upstream tracking state.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    pub name: String,
    /// Full ref name, `refs/heads/<name>`.
    pub refname: String,
    pub remote_name: Option<String>,
    /// Merge refs exactly as configured.
    pub merge_name: Vec<String>,
    /// One resolved rule per configured merge name; `dst` is None when no
    /// fetch rule of the upstream tracks that ref.
    pub merge: Vec<Refspec>,
}

impl Branch {
    pub fn has_merge_config(&self) -> bool {
        !self.merge.is_empty()
    }

    /// Does the i-th configured merge ref name the given full ref?
    pub fn merge_matches(&self, i: usize, refname: &str) -> bool {
        self.merge
            .get(i)
            .is_some_and(|m| ref_matches_abbrev(&m.src, refname))
    }
}

/// Name-keyed registry of remotes and branches.
///
/// Feed it pairs with [`handle_config`](Self::handle_config); call
/// [`resolve_head`](Self::resolve_head) first if the default remote
/// should follow the checked-out branch.
#[derive(Debug, Default)]
pub struct RemoteRegistry {
    git_dir: Option<PathBuf>,
    remotes: Vec<Remote>,
    branches: Vec<Branch>,
    default_remote_name: String,
    current_branch: Option<usize>,
    warnings: Vec<String>,
}

impl RemoteRegistry {
    /// Create a registry. `git_dir` enables the legacy `remotes/` and
    /// `branches/` descriptor-file fallbacks.
    pub fn new(git_dir: Option<PathBuf>) -> Self {
        Self {
            git_dir,
            default_remote_name: "origin".to_string(),
            ..Self::default()
        }
    }

    /// Resolve the current branch from a symbolic HEAD; a later
    /// `branch.<current>.remote` pair then overrides the default remote.
    pub fn resolve_head(&mut self, store: &dyn RefStore) -> Result<(), RemoteError> {
        let head = RefName::new("HEAD")?;
        if let Some((target, _, flags)) = store.resolve_symbolic(&head)? {
            if flags.contains(RefFlags::SYMBOLIC) {
                if let Some(short) = target.as_str().strip_prefix("refs/heads/") {
                    let short = short.to_string();
                    let bi = self.branch_index(&short);
                    self.current_branch = Some(bi);
                }
            }
        }
        Ok(())
    }

    /// Feed one configuration pair. Keys outside `remote.*` and
    /// `branch.*` are ignored; so are valueless (boolean-form) keys.
    pub fn handle_config(&mut self, key: &str, value: Option<&str>) {
        if let Some(rest) = key.strip_prefix("branch.") {
            let Some(dot) = rest.rfind('.') else { return };
            let (name, sub) = (&rest[..dot], &rest[dot + 1..]);
            let Some(value) = value else { return };
            let bi = self.branch_index(name);
            match sub {
                "remote" => {
                    self.branches[bi].remote_name = Some(value.to_string());
                    if self.current_branch == Some(bi) {
                        self.default_remote_name = value.to_string();
                    }
                }
                "merge" => self.branches[bi].merge_name.push(value.to_string()),
                _ => {}
            }
            return;
        }

        let Some(rest) = key.strip_prefix("remote.") else {
            return;
        };
        let Some(dot) = rest.rfind('.') else {
            self.warnings
                .push(format!("config with no key for remote {rest}"));
            return;
        };
        let (name, sub) = (&rest[..dot], &rest[dot + 1..]);
        if name.starts_with('/') {
            self.warnings.push(format!(
                "config remote shorthand cannot begin with '/': {name}"
            ));
            return;
        }
        let Some(value) = value else { return };
        let ri = self.remote_index(name);
        let remote = &mut self.remotes[ri];
        match sub {
            "url" => remote.urls.push(value.to_string()),
            "push" => remote.push_raw.push(value.to_string()),
            "fetch" => remote.fetch_raw.push(value.to_string()),
            "receivepack" => {
                if remote.receivepack.is_none() {
                    remote.receivepack = Some(value.to_string());
                } else {
                    self.warnings
                        .push("more than one receivepack given, using the first".to_string());
                }
            }
            "uploadpack" => {
                if remote.uploadpack.is_none() {
                    remote.uploadpack = Some(value.to_string());
                } else {
                    self.warnings
                        .push("more than one uploadpack given, using the first".to_string());
                }
            }
            "tagopt" => {
                if value == "--no-tags" {
                    remote.fetch_tags = TagFollow::None;
                }
            }
            _ => {}
        }
    }

    /// Look up a remote by name, or the default remote for None. Applies
    /// the legacy descriptor-file fallbacks and parses the refspecs.
    pub fn remote_get(&mut self, name: Option<&str>) -> &Remote {
        let name = name
            .unwrap_or(self.default_remote_name.as_str())
            .to_string();
        let ri = self.remote_index(&name);
        if !name.starts_with('/') {
            if self.remotes[ri].urls.is_empty() {
                self.read_remotes_file(ri);
            }
            if self.remotes[ri].urls.is_empty() {
                self.read_branches_file(ri);
            }
        }
        if self.remotes[ri].urls.is_empty() {
            // a bare name can itself be a URL or local path
            self.remotes[ri].urls.push(name);
        }
        self.parse_refspecs(ri);
        &self.remotes[ri]
    }

    /// Visit every registered remote with its refspecs parsed.
    pub fn for_each_remote<F>(&mut self, mut f: F) -> Result<(), RemoteError>
    where
        F: FnMut(&Remote) -> Result<(), RemoteError>,
    {
        for ri in 0..self.remotes.len() {
            self.parse_refspecs(ri);
            f(&self.remotes[ri])?;
        }
        Ok(())
    }

    /// Look up a branch; None, "" and "HEAD" name the current branch.
    /// Resolves the branch's merge refs through the upstream remote's
    /// fetch rules; resolution is idempotent.
    pub fn branch_get(&mut self, name: Option<&str>) -> Option<&Branch> {
        let bi = match name {
            None | Some("") | Some("HEAD") => self.current_branch?,
            Some(n) => self.branch_index(n),
        };
        if let Some(remote_name) = self.branches[bi].remote_name.clone() {
            self.remote_get(Some(&remote_name));
            let ri = self.remote_index(&remote_name);
            if self.branches[bi].merge.len() != self.branches[bi].merge_name.len() {
                let remote = self.remotes[ri].clone();
                let resolved = self.branches[bi]
                    .merge_name
                    .iter()
                    .map(|m| {
                        remote.tracking_for(m).unwrap_or(Refspec {
                            force: false,
                            pattern: false,
                            src: m.clone(),
                            dst: None,
                        })
                    })
                    .collect();
                self.branches[bi].merge = resolved;
            }
        }
        Some(&self.branches[bi])
    }

    /// Non-fatal diagnostics accumulated while building the registry.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn remote_index(&mut self, name: &str) -> usize {
        if let Some(i) = self.remotes.iter().position(|r| r.name == name) {
            return i;
        }
        self.remotes.push(Remote {
            name: name.to_string(),
            ..Remote::default()
        });
        self.remotes.len() - 1
    }

    fn branch_index(&mut self, name: &str) -> usize {
        if let Some(i) = self.branches.iter().position(|b| b.name == name) {
            return i;
        }
        self.branches.push(Branch {
            name: name.to_string(),
            refname: format!("refs/heads/{name}"),
            ..Branch::default()
        });
        self.branches.len() - 1
    }

    fn parse_refspecs(&mut self, ri: usize) {
        if self.remotes[ri].parsed {
            return;
        }
        let (fetch, fetch_bad) = Refspec::parse_all(&self.remotes[ri].fetch_raw);
        let (push, push_bad) = Refspec::parse_all(&self.remotes[ri].push_raw);
        for (spec, err) in fetch_bad.into_iter().chain(push_bad) {
            self.warnings
                .push(format!("ignoring refspec '{spec}': {err}"));
        }
        let remote = &mut self.remotes[ri];
        remote.fetch = fetch;
        remote.push = push;
        remote.parsed = true;
    }

    /// Legacy `remotes/<name>` descriptor with `URL:`, `Push:` and `Pull:`
    /// lines, one value per line, whitespace trimmed.
    fn read_remotes_file(&mut self, ri: usize) {
        let Some(dir) = &self.git_dir else { return };
        let path = dir.join("remotes").join(&self.remotes[ri].name);
        let Ok(contents) = fs::read_to_string(path) else {
            return;
        };
        for line in contents.lines() {
            let (kind, rest) = if let Some(r) = line.strip_prefix("URL:") {
                ('u', r)
            } else if let Some(r) = line.strip_prefix("Push:") {
                ('p', r)
            } else if let Some(r) = line.strip_prefix("Pull:") {
                ('f', r)
            } else {
                continue;
            };
            let value = rest.trim();
            if value.is_empty() {
                continue;
            }
            let remote = &mut self.remotes[ri];
            match kind {
                'u' => remote.urls.push(value.to_string()),
                'p' => remote.push_raw.push(value.to_string()),
                _ => remote.fetch_raw.push(value.to_string()),
            }
        }
    }

    /// Legacy `branches/<name>` descriptor: a single `<url>[#<fragment>]`
    /// line. The fragment names the branch to fetch (default `master`);
    /// a `/suffix` in the remote name is appended to the URL. Always
    /// implies fetching all tags.
    fn read_branches_file(&mut self, ri: usize) {
        let Some(dir) = &self.git_dir else { return };
        let name = self.remotes[ri].name.clone();
        let (file_part, suffix) = match name.find('/') {
            Some(i) => (&name[..i], Some(&name[i..])),
            None => (name.as_str(), None),
        };
        let path = dir.join("branches").join(file_part);
        let Ok(contents) = fs::read_to_string(path) else {
            return;
        };
        let Some(line) = contents.lines().next() else {
            return;
        };
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let mut url = line.to_string();
        if let Some(sfx) = suffix {
            url.push_str(sfx);
        }
        let (url, frag) = match url.split_once('#') {
            Some((u, f)) => (u.to_string(), Some(f.to_string())),
            None => (url, None),
        };
        let branch = match frag {
            Some(f) => format!("refs/heads/{f}"),
            None => "refs/heads/master".to_string(),
        };

        let remote = &mut self.remotes[ri];
        remote.urls.push(url);
        remote.fetch_raw.push(branch);
        remote.fetch_tags = TagFollow::All;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refsync_hash::ObjectId;
    use refsync_ref::RefError;

    /// Store whose HEAD is a symref to the given branch.
    struct HeadAt(&'static str);

    impl RefStore for HeadAt {
        fn enumerate(&self) -> Result<Vec<(RefName, ObjectId, RefFlags)>, RefError> {
            Ok(Vec::new())
        }

        fn resolve_symbolic(
            &self,
            name: &RefName,
        ) -> Result<Option<(RefName, ObjectId, RefFlags)>, RefError> {
            if name.as_str() != "HEAD" {
                return Ok(None);
            }
            Ok(Some((
                RefName::new(format!("refs/heads/{}", self.0))?,
                ObjectId::NULL,
                RefFlags::SYMBOLIC,
            )))
        }
    }

    fn registry_with(pairs: &[(&str, Option<&str>)]) -> RemoteRegistry {
        let mut reg = RemoteRegistry::new(None);
        for (k, v) in pairs {
            reg.handle_config(k, *v);
        }
        reg
    }

    #[test]
    fn remote_from_config() {
        let mut reg = registry_with(&[
            ("remote.origin.url", Some("https://example.com/repo.git")),
            ("remote.origin.fetch", Some("+refs/heads/*:refs/remotes/origin/*")),
            ("remote.origin.push", Some("refs/heads/main")),
        ]);
        let r = reg.remote_get(Some("origin"));
        assert_eq!(r.urls, vec!["https://example.com/repo.git"]);
        assert_eq!(r.fetch.len(), 1);
        assert!(r.fetch[0].pattern && r.fetch[0].force);
        assert_eq!(r.push.len(), 1);
        assert!(r.has_url("https://example.com/repo.git"));
    }

    #[test]
    fn default_remote_is_origin() {
        let mut reg = registry_with(&[("remote.origin.url", Some("u"))]);
        assert_eq!(reg.remote_get(None).name, "origin");
    }

    #[test]
    fn bare_name_is_its_own_url() {
        let mut reg = RemoteRegistry::new(None);
        let r = reg.remote_get(Some("host:/path/repo.git"));
        assert_eq!(r.urls, vec!["host:/path/repo.git"]);
    }

    #[test]
    fn second_receivepack_warns_and_keeps_first() {
        let mut reg = registry_with(&[
            ("remote.origin.receivepack", Some("first")),
            ("remote.origin.receivepack", Some("second")),
        ]);
        assert_eq!(reg.warnings().len(), 1);
        let r = reg.remote_get(Some("origin"));
        assert_eq!(r.receivepack.as_deref(), Some("first"));
    }

    #[test]
    fn tagopt_no_tags() {
        let mut reg = registry_with(&[("remote.origin.tagopt", Some("--no-tags"))]);
        assert_eq!(reg.remote_get(Some("origin")).fetch_tags, TagFollow::None);
    }

    #[test]
    fn bad_refspec_becomes_warning_not_error() {
        let mut reg = registry_with(&[
            ("remote.origin.url", Some("u")),
            ("remote.origin.fetch", Some("refs/heads/*:refs/one")),
            ("remote.origin.fetch", Some("+refs/tags/*:refs/tags/*")),
        ]);
        let r = reg.remote_get(Some("origin"));
        assert_eq!(r.fetch.len(), 1);
        assert_eq!(reg.warnings().len(), 1);
        assert!(reg.warnings()[0].contains("refs/heads/*:refs/one"));
    }

    #[test]
    fn keyless_and_slash_names_warn() {
        let mut reg = registry_with(&[
            ("remote.origin", Some("x")),
            ("remote./abs/path.url", Some("x")),
        ]);
        assert_eq!(reg.warnings().len(), 2);
    }

    #[test]
    fn valueless_keys_are_ignored() {
        let mut reg = registry_with(&[("remote.origin.url", None)]);
        assert!(reg.warnings().is_empty());
        // the remote record exists but gained nothing from the pair
        assert_eq!(reg.remote_get(Some("origin")).urls, vec!["origin"]);
    }

    #[test]
    fn branch_merge_resolves_through_fetch_rules() {
        let mut reg = registry_with(&[
            ("remote.origin.url", Some("u")),
            ("remote.origin.fetch", Some("+refs/heads/*:refs/remotes/origin/*")),
            ("branch.main.remote", Some("origin")),
            ("branch.main.merge", Some("refs/heads/main")),
        ]);
        let b = reg.branch_get(Some("main")).unwrap();
        assert!(b.has_merge_config());
        assert_eq!(b.merge[0].src, "refs/heads/main");
        assert_eq!(b.merge[0].dst.as_deref(), Some("refs/remotes/origin/main"));
        assert!(b.merge_matches(0, "refs/heads/main"));
        assert!(!b.merge_matches(0, "refs/heads/dev"));
    }

    #[test]
    fn branch_get_is_idempotent() {
        let mut reg = registry_with(&[
            ("remote.origin.url", Some("u")),
            ("remote.origin.fetch", Some("+refs/heads/*:refs/remotes/origin/*")),
            ("branch.main.remote", Some("origin")),
            ("branch.main.merge", Some("refs/heads/main")),
        ]);
        reg.branch_get(Some("main"));
        let b = reg.branch_get(Some("main")).unwrap();
        assert_eq!(b.merge.len(), 1);
    }

    #[test]
    fn unresolvable_merge_keeps_name_without_destination() {
        let mut reg = registry_with(&[
            ("remote.origin.url", Some("u")),
            ("remote.origin.fetch", Some("refs/heads/main:refs/remotes/origin/main")),
            ("branch.topic.remote", Some("origin")),
            ("branch.topic.merge", Some("refs/heads/elsewhere")),
        ]);
        let b = reg.branch_get(Some("topic")).unwrap();
        assert_eq!(b.merge[0].src, "refs/heads/elsewhere");
        assert_eq!(b.merge[0].dst, None);
    }

    #[test]
    fn tracking_both_directions() {
        let mut reg = registry_with(&[
            ("remote.origin.url", Some("u")),
            ("remote.origin.fetch", Some("+refs/heads/*:refs/remotes/origin/*")),
        ]);
        let r = reg.remote_get(Some("origin")).clone();

        let t = r.tracking_for("refs/heads/main").unwrap();
        assert_eq!(t.dst.as_deref(), Some("refs/remotes/origin/main"));
        assert!(t.force);
        assert!(!t.pattern);

        let s = r.tracking_source_of("refs/remotes/origin/main").unwrap();
        assert_eq!(s.src, "refs/heads/main");

        assert!(r.tracking_for("refs/tags/v1").is_none());
    }

    #[test]
    fn current_branch_remote_becomes_default() {
        let mut reg = RemoteRegistry::new(None);
        reg.resolve_head(&HeadAt("work")).unwrap();
        reg.handle_config("remote.upstream.url", Some("u"));
        reg.handle_config("branch.work.remote", Some("upstream"));
        reg.handle_config("branch.other.remote", Some("elsewhere"));
        assert_eq!(reg.remote_get(None).name, "upstream");
    }

    #[test]
    fn branch_get_of_head_names_current_branch() {
        let mut reg = RemoteRegistry::new(None);
        reg.resolve_head(&HeadAt("work")).unwrap();
        assert_eq!(reg.branch_get(Some("HEAD")).unwrap().name, "work");
        assert_eq!(reg.branch_get(None).unwrap().refname, "refs/heads/work");
    }

    #[test]
    fn for_each_remote_visits_all_parsed() {
        let mut reg = registry_with(&[
            ("remote.a.url", Some("ua")),
            ("remote.a.fetch", Some("+refs/heads/*:refs/remotes/a/*")),
            ("remote.b.url", Some("ub")),
        ]);
        let mut names = Vec::new();
        reg.for_each_remote(|r| {
            names.push(r.name.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }
}
