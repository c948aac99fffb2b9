//! State module for tracking crawl progress
//!
//! This module provides the runtime state for sources during a crawl run.
//!
//! # Components
//!
//! - `Source`: A registered documentation site with its include/exclude rules
//! - `PendingEntry`: A discovered URL waiting for (or undergoing) a crawl attempt
//! - `TaskGroup`: Per-source pending URLs and completed pages

mod pending;
mod source;
mod task_group;

// Re-export main types
pub use pending::{PendingEntry, PendingStatus};
pub use source::Source;
pub use task_group::{GroupStatus, TaskGroup};
