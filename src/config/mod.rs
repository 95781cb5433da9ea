//! Configuration constants
//!
//! Fixed names and default values shared across the crate.

pub mod defaults;
