//! Workspace boundary checking for file operations.

use globset::{Glob, GlobMatcher};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Paths that must never be deleted without confirmation.
///
/// Matched against the path relative to the workspace root.
pub const DEFAULT_PROTECTED_PATTERNS: &[&str] = &[
    "**/.git",
    "**/.git/**",
    "**/.hg",
    "**/.hg/**",
    "**/.svn",
    "**/.svn/**",
    "**/.jj",
    "**/.jj/**",
    "**/.hybot",
    "**/.hybot/**",
];

/// Result of resolving a path against the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathCheck {
    /// Resolves inside the workspace root.
    Inside(PathBuf),
    /// Resolves outside the workspace root.
    Outside(PathBuf),
    /// Could not be resolved at all.
    Unresolvable(String),
}

/// Workspace boundary checker.
///
/// Pre-compiles the protected glob patterns.
#[derive(Debug)]
pub struct WorkspaceBoundary {
    root: PathBuf,
    patterns: Vec<String>,
    /// Pre-compiled glob matchers for protected paths.
    protected: Vec<GlobMatcher>,
}

impl Clone for WorkspaceBoundary {
    fn clone(&self) -> Self {
        // Re-compile matchers when cloning
        Self::with_protected_patterns(self.root.clone(), self.patterns.clone())
    }
}

impl WorkspaceBoundary {
    /// Create a boundary with the default protected patterns.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_protected_patterns(
            root,
            DEFAULT_PROTECTED_PATTERNS.iter().map(ToString::to_string),
        )
    }

    /// Create a boundary with custom protected patterns.
    ///
    /// Invalid globs are logged and skipped.
    #[must_use]
    pub fn with_protected_patterns(
        root: impl Into<PathBuf>,
        patterns: impl IntoIterator<Item = String>,
    ) -> Self {
        let root = root.into();
        let normalized = normalize(&root);
        let root = normalized.canonicalize().unwrap_or(normalized);

        let patterns: Vec<String> = patterns.into_iter().collect();
        let protected = patterns
            .iter()
            .filter_map(|pattern| match Glob::new(pattern) {
                Ok(glob) => Some(glob.compile_matcher()),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Failed to compile protected path pattern");
                    None
                },
            })
            .collect();

        Self {
            root,
            patterns,
            protected,
        }
    }

    /// The canonical workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path the runner acts on: joined onto the root and folded
    /// lexically, with symlinks left in place.
    ///
    /// Deleting this path removes a link rather than what it points to.
    ///
    /// # Errors
    ///
    /// Returns a description when the path is empty or contains a NUL byte.
    pub fn lexical_target(&self, path: &Path) -> Result<PathBuf, String> {
        let raw = path.as_os_str();
        if raw.is_empty() {
            return Err("empty path".to_string());
        }
        if raw.as_encoded_bytes().contains(&0) {
            return Err("path contains a NUL byte".to_string());
        }

        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        Ok(normalize(&joined))
    }

    /// Resolve a path to where it actually lands on disk.
    ///
    /// Starts from [`lexical_target`](Self::lexical_target) and
    /// canonicalizes the longest existing prefix, following dangling links
    /// too, so that symlinks pointing out of the workspace are caught.
    ///
    /// # Errors
    ///
    /// Returns a description when the path is empty, contains a NUL byte,
    /// or an existing prefix cannot be canonicalized.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, String> {
        let lexical = self.lexical_target(path)?;
        canonicalize_existing_prefix(&lexical)
            .map_err(|e| format!("cannot resolve {}: {e}", path.display()))
    }

    /// Check whether a path resolves inside the workspace.
    #[must_use]
    pub fn check(&self, path: &Path) -> PathCheck {
        let resolved = match self.resolve(path) {
            Ok(p) => p,
            Err(reason) => return PathCheck::Unresolvable(reason),
        };

        debug!(
            path = %path.display(),
            resolved = %resolved.display(),
            "Checking path against workspace"
        );

        if resolved.starts_with(&self.root) {
            PathCheck::Inside(resolved)
        } else {
            PathCheck::Outside(resolved)
        }
    }

    /// Whether a resolved path is the workspace root or matches a protected
    /// pattern.
    #[must_use]
    pub fn is_protected(&self, resolved: &Path) -> bool {
        if resolved == self.root {
            return true;
        }
        let relative = resolved.strip_prefix(&self.root).unwrap_or(resolved);
        self.protected.iter().any(|m| m.is_match(relative))
    }
}

/// Fold `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Symlink hops followed before giving up, matching the kernel's ELOOP limit.
const MAX_LINK_HOPS: usize = 40;

/// Canonicalize the deepest existing ancestor and re-append the rest.
///
/// A missing entry that is itself a symlink is followed to its target, so
/// a dangling link cannot pass for a new file under its own name.
fn canonicalize_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<OsString> = Vec::new();
    let mut hops: usize = 0;
    loop {
        match existing.canonicalize() {
            Ok(canonical) => return Ok(reattach(canonical, &tail)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(target) = dangling_link_target(&existing)? {
                    hops = hops.saturating_add(1);
                    if hops > MAX_LINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    existing = target;
                    continue;
                }
                let Some(name) = existing.file_name().map(OsString::from) else {
                    return Ok(reattach(existing, &tail));
                };
                tail.push(name);
                if !existing.pop() {
                    return Ok(reattach(existing, &tail));
                }
            },
            Err(e) => return Err(e),
        }
    }
}

/// The target of `path` when `path` is a symlink, resolved against its
/// parent directory.
fn dangling_link_target(path: &Path) -> io::Result<Option<PathBuf>> {
    match path.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => {
            let target = std::fs::read_link(path)?;
            let base = path.parent().unwrap_or(path);
            Ok(Some(normalize(&base.join(target))))
        },
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Push the stripped trailing names back, innermost last.
fn reattach(mut base: PathBuf, tail: &[OsString]) -> PathBuf {
    for name in tail.iter().rev() {
        base.push(name);
    }
    base
}
