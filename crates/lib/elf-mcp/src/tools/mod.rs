//! MCP tool modules.
//!
//! Tools are grouped by concern: the dispatch tools that start background
//! work, job inspection, and contextual help.

pub mod dispatch;
pub mod jobs;
mod context;
