//! Managed-directory predicate
//!
//! Decides whether a directory belongs to the tree the index cares about,
//! for example because it sits inside a version-control working copy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Whether `path` must be kept in the index even without children
pub trait ManagedPredicate: Send + Sync {
    fn is_managed(&self, path: &Path) -> bool;
}

impl<F> ManagedPredicate for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    #[inline]
    fn is_managed(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Every directory at or below one of the roots is managed
#[derive(Debug, Clone, Default)]
pub struct ManagedRoots {
    roots: HashSet<PathBuf>,
}

impl ManagedRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.insert(root.into());
    }
}

impl ManagedPredicate for ManagedRoots {
    fn is_managed(&self, path: &Path) -> bool {
        path.ancestors().any(|ancestor| self.roots.contains(ancestor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_cover_descendants() {
        let roots = ManagedRoots::new(["/work/repo"]);
        assert!(roots.is_managed(Path::new("/work/repo")));
        assert!(roots.is_managed(Path::new("/work/repo/src/lib")));
        assert!(!roots.is_managed(Path::new("/work")));
        assert!(!roots.is_managed(Path::new("/work/repository")));
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = |path: &Path| path.ends_with("managed");
        assert!(predicate.is_managed(Path::new("/a/managed")));
        assert!(!predicate.is_managed(Path::new("/a/other")));
    }
}
