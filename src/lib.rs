//! ska-builder - conda package build orchestrator
//!
//! Resolves package identifiers to their `meta.yaml` descriptions, checks
//! out upstream sources and drives `conda build` over an ordered list of
//! packages, collecting per-package outcomes into a report.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Resolution and orchestration logic
//! - [`infra`] - Infrastructure layer (filesystem, git, external processes)
//! - [`config`] - Constants and defaults
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
