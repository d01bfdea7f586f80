//! Pure domain logic for the newspaper curation application.
//!
//! Nothing in this crate touches the filesystem, the network, or the wall
//! clock; callers pass in what was found and the current time.

pub mod batching;
pub mod dupes;
pub mod finder;
pub mod lookup;
pub mod schema;
pub mod workflow;

pub use batching::{random_batch_name, BatchBuilder, PackingLimits, QueuedIssue, ReadyIssue};
pub use dupes::check_duplicates;
pub use finder::{Finder, FinderError};
pub use lookup::{Lookup, LookupError};
pub use schema::{
    AppError, Batch, BatchId, BatchName, BatchNameError, DuplicateOf, ErrorKind, ErrorList, File,
    Issue, IssueId, SearchKey, SearchKeyError, Title, TitleId, WorkflowStep,
};
