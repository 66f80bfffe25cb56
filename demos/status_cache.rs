//! Version-control status cache walkthrough
//!
//! A fake status provider sits behind `Turbo`; the folder index tracks which
//! files under the working copy have a cached status.
//!
//! Run with `RUST_LOG=debug TURBO_STATISTICS=minimal` to see the cache talk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use turbo_cache::prelude::*;

const STATUS: &str = "vcs.status";

/// Pretends to ask the version-control tool for a file's status
struct FakeStatusProvider {
    root: PathBuf,
    statuses: Mutex<HashMap<PathBuf, String>>,
}

impl TurboProvider<PathBuf, String> for FakeStatusProvider {
    fn recognizes_attribute(&self, name: &str) -> bool {
        name == STATUS
    }

    fn recognizes_entity(&self, key: &PathBuf) -> bool {
        key.starts_with(&self.root)
    }

    fn read_entry(
        &self,
        key: &Arc<PathBuf>,
        _name: &str,
        _memory: &MemoryCache<'_, PathBuf, String>,
    ) -> Option<Cached<String>> {
        println!("  provider: status of {}", key.display());
        let statuses = self.statuses.lock().ok()?;
        Some(statuses.get(key.as_path()).cloned().into())
    }

    fn write_entry(
        &self,
        key: &Arc<PathBuf>,
        _name: &str,
        value: Option<&Cached<String>>,
    ) -> Result<bool, TurboError> {
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|_| TurboError::provider_failed("status table poisoned"))?;
        match value.and_then(Cached::value) {
            Some(status) => statuses.insert(key.to_path_buf(), status.clone()),
            None => statuses.remove(key.as_path()),
        };
        Ok(true)
    }
}

fn main() -> Result<(), TurboError> {
    env_logger::init();

    let root = PathBuf::from("/work/repo");
    let provider = Arc::new(FakeStatusProvider {
        root: root.clone(),
        statuses: Mutex::new(HashMap::from([
            (root.join("src/main.rs"), "modified".to_string()),
            (root.join("README.md"), "up-to-date".to_string()),
        ])),
    });

    let turbo: Turbo<PathBuf, String> = Turbo::create_custom(vec![provider as ProviderRef<PathBuf, String>], 200, Some(5000))?;
    let index = CacheIndex::new(ManagedRoots::new([root.clone()]));

    let files: Vec<Arc<PathBuf>> = ["src/main.rs", "src/lib.rs", "README.md"]
        .iter()
        .map(|name| Arc::new(root.join(name)))
        .collect();

    println!("first pass:");
    for file in &files {
        let status = turbo.read_entry(file, STATUS);
        index.add(file);
        println!("{} -> {}", file.display(), describe(status.as_ref()));
    }

    println!("second pass:");
    for file in &files {
        let status = turbo.read_entry(file, STATUS);
        println!("{} -> {}", file.display(), describe(status.as_ref()));
    }

    turbo.write_entry(&files[1], STATUS, Some(Cached::Value("added".to_string())))?;
    let mut ctx = ReadContext::new();
    if turbo.is_prepared(&files[1], STATUS, &mut ctx) {
        let status = turbo.memory().get_in(&files[1], STATUS, &mut ctx);
        println!("after add: {}", describe(status.as_ref()));
    }

    print_tree(&index, &root, 0);

    index.add_all(&root.join("src"), Vec::new());
    println!("after clearing src:");
    print_tree(&index, &root, 0);

    println!("{:?}", turbo.statistics().snapshot());
    turbo.shutdown();
    Ok(())
}

fn describe(status: Option<&Cached<String>>) -> &str {
    match status {
        Some(Cached::Value(status)) => status.as_str(),
        Some(Cached::Null) => "<untracked>",
        None => "<unknown>",
    }
}

fn print_tree<M: ManagedPredicate>(index: &CacheIndex<M>, dir: &Path, depth: usize) {
    let mut children = index.get(dir);
    children.sort();
    for child in children {
        println!("{:indent$}{}", "", child.display(), indent = depth * 2);
        print_tree(index, &child, depth + 1);
    }
}
