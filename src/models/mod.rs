//! Data models for the retrieval pipeline.
//!
//! This module contains the records read from a workspace and the results read back from the index.

/// Workspace context records and index kinds
pub mod context;
/// Query matches and the heavy range heuristic
pub mod matches;
