//! Cache system module
//!
//! Two-tier attribute memory, the folder index used for bulk queries and the
//! provider extension point.

pub mod config;
pub mod index;
pub mod memory;
pub mod traits;
