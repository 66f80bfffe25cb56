//! Directory-hierarchy index over cached paths
//!
//! Maps each indexed directory to the set of its immediate children known
//! to the cache. Directories appear when something below them needs them
//! and disappear, cascading upward, once they have no children left, unless
//! the managed predicate pins them.
//!
//! Reads go straight to the concurrent map. Every multi-step mutation runs
//! under one operation lock so a cascade never observes a half-updated
//! chain of ancestors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use super::managed::ManagedPredicate;

/// Parent directory of `path`, treating a bare relative name as parentless
#[inline]
fn parent_of(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Parent to children index supporting folder-scoped bulk operations
pub struct CacheIndex<M> {
    index: DashMap<PathBuf, HashSet<PathBuf>>,
    managed: M,
    op_lock: Mutex<()>,
}

impl<M> std::fmt::Debug for CacheIndex<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheIndex")
            .field("nodes", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl<M: ManagedPredicate> CacheIndex<M> {
    pub fn new(managed: M) -> Self {
        Self {
            index: DashMap::new(),
            managed,
            op_lock: Mutex::new(()),
        }
    }

    pub fn managed(&self) -> &M {
        &self.managed
    }

    fn lock_ops(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Immediate children indexed under `key`, empty when none
    pub fn get(&self, key: &Path) -> Vec<PathBuf> {
        self.index
            .get(key)
            .map(|children| children.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every indexed child, deduplicated
    pub fn all_values(&self) -> Vec<PathBuf> {
        let mut all = HashSet::new();
        for node in self.index.iter() {
            all.extend(node.value().iter().cloned());
        }
        all.into_iter().collect()
    }

    /// Whether `key` is an index node
    pub fn contains(&self, key: &Path) -> bool {
        self.index.contains_key(key)
    }

    /// Number of index nodes
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Register `file` under its parent and link the parent upward
    ///
    /// A path without a parent cannot be indexed and is ignored.
    pub fn add(&self, file: &Path) {
        let Some(parent) = parent_of(file) else {
            log::info!("Not indexing {}: it has no parent directory", file.display());
            return;
        };

        let _guard = self.lock_ops();
        self.index
            .entry(parent.to_path_buf())
            .or_default()
            .insert(file.to_path_buf());
        self.ensure_parents(parent);
    }

    /// Replace the children of `file`
    ///
    /// Former children missing from `files` are dropped only when nothing is
    /// indexed below them; a former child that still has children of its own
    /// stays in the set.
    pub fn add_all<I>(&self, file: &Path, files: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut children: HashSet<PathBuf> = files.into_iter().collect();

        let _guard = self.lock_ops();
        let stale: Vec<PathBuf> = self
            .index
            .get(file)
            .map(|previous| previous.difference(&children).cloned().collect())
            .unwrap_or_default();

        for child in stale {
            if self.has_children(&child) {
                log::debug!(
                    "Keeping {} under {}: it still indexes children",
                    child.display(),
                    file.display()
                );
                children.insert(child);
            } else if !self.managed.is_managed(&child) {
                self.index.remove_if(&child, |_, grandchildren| grandchildren.is_empty());
            }
        }

        if children.is_empty() {
            if self.index.contains_key(file) {
                self.index.insert(file.to_path_buf(), children);
            }
            self.clean_up_parents(file);
        } else {
            self.index.insert(file.to_path_buf(), children);
            self.ensure_parents(file);
        }
    }

    /// Stop tracking `file` and prune ancestors it leaves empty
    pub fn remove(&self, file: &Path) {
        let Some(parent) = parent_of(file) else {
            return;
        };

        let _guard = self.lock_ops();
        let emptied = match self.index.get_mut(parent) {
            Some(mut children) => children.remove(file) && children.is_empty(),
            None => return,
        };
        if emptied {
            self.clean_up_parents(parent);
        }
    }

    fn has_children(&self, key: &Path) -> bool {
        self.index
            .get(key)
            .is_some_and(|children| !children.is_empty())
    }

    /// Link `file` into its ancestors, walking upward
    ///
    /// Existing ancestors are extended, including ones that already link
    /// their child; missing ones are created only when managed. The walk
    /// stops at the first unmanaged gap.
    fn ensure_parents(&self, file: &Path) {
        let mut child = file.to_path_buf();
        while let Some(parent) = parent_of(&child).map(Path::to_path_buf) {
            let existing = self
                .index
                .get_mut(&parent)
                .map(|mut children| children.insert(child.clone()))
                .is_some();

            if !existing {
                if !self.managed.is_managed(&parent) {
                    break;
                }
                self.index
                    .entry(parent.clone())
                    .or_default()
                    .insert(child.clone());
            }
            child = parent;
        }
    }

    /// Drop `file` if it has no children, cascading to emptied ancestors
    ///
    /// A managed node is pinned: it keeps its (empty) entry and the walk
    /// does not start. Each emptied, unmanaged ancestor is removed and the
    /// walk moves up; the first ancestor with children left stops it.
    fn clean_up_parents(&self, file: &Path) {
        if self.has_children(file) || self.managed.is_managed(file) {
            return;
        }
        self.index.remove(file);

        let mut child = file.to_path_buf();
        while let Some(parent) = parent_of(&child).map(Path::to_path_buf) {
            let emptied = match self.index.get_mut(&parent) {
                Some(mut children) => {
                    children.remove(&child);
                    children.is_empty()
                }
                None => break,
            };
            if !emptied || self.managed.is_managed(&parent) {
                break;
            }
            self.index.remove(&parent);
            log::trace!("Pruned empty index node {}", parent.display());
            child = parent;
        }
    }
}
