//! Core business logic module
//!
//! External processes and source control are reached through the traits
//! defined here and implemented in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`metadata`] - Description loading and validation
//! - [`resolver`] - Package index construction and caching
//! - [`rewrite`] - Version overwrite text transformation
//! - [`source`] - Upstream source checkout logic
//! - [`orchestrator`] - Sequential build loop and report
//! - [`build_order`] - Build-order file parsing
//! - [`settings`] - Configuration file model

pub mod build_order;
pub mod metadata;
pub mod orchestrator;
pub mod resolver;
pub mod rewrite;
pub mod settings;
pub mod source;
