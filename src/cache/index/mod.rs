//! Folder-to-children index used for bulk queries over cached files

pub mod core;
pub mod managed;

pub use self::core::CacheIndex;
pub use managed::{ManagedPredicate, ManagedRoots};
