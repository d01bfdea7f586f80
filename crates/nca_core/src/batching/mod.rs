//! Batch assembly: readiness filtering, per-MOC page packing, and batch
//! keyword generation.

mod builder;
mod names;
mod queue;

pub use builder::{find_ready_issues, BatchBuilder, PackedBatch, PackingLimits, ReadyIssue};
pub use names::random_batch_name;
pub use queue::{IssueQueue, QueuedIssue};
