//! Shared utilities for memoria
//!
//! Process-level helpers used across the workspace: the exit statistics
//! collector, crash-safe file writes and tracing initialisation.

pub mod atomic_file;
pub mod exit_stats;
pub mod tracing;

pub use atomic_file::*;
pub use exit_stats::{Collectable, Registration, StatsCollector, StatsSummary, SummaryGuard};
