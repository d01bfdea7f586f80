//! Workflow state engine: issue records, claims, permission checks, and the
//! transitions users and jobs may invoke.

mod can;
mod metadata;
mod privilege;
mod record;
mod transition;

pub use can::{Can, Denial, Status};
pub use metadata::{validate_metadata, MetadataContext};
pub use privilege::{Privilege, Role, UnknownRole, User};
pub use record::{Action, ActionKind, IssueRecord};
pub use transition::Workflow;
