//! Core types and services for the ELF tools.
//!
//! This crate owns path resolution for the Emergent Learning tree, the
//! background job registry used by the dispatch tools, the control plane
//! behind the query, swarm and check-in tools, and the standalone launcher,
//! watcher and heuristics schema helpers.

pub mod control;
pub mod exec;
pub mod heuristics;
pub mod jobs;
pub mod launch;
pub mod paths;
pub mod watcher;
