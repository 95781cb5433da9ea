//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, git, and external processes.

pub mod conda;
pub mod dirs;
pub mod filesystem;
pub mod git;
pub mod version_scm;
