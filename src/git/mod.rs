//! Git operations module
//!
//! Working-copy operations go through libgit2 rather than shelling out to
//! `git`, so a clone, commit and push behave the same on every host.

pub mod operations;

pub use operations::{Git2Operations, GitOperations};
