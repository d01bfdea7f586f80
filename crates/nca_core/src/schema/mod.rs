mod batch_name;
mod error;
mod key;
mod model;
mod step;

pub use batch_name::{BatchName, BatchNameError};
pub use error::{AppError, DuplicateOf, ErrorKind, ErrorList};
pub use key::{date_edition, escape_tsv, is_valid_edition, parse_raw_date, IssueKey, SearchKey, SearchKeyError};
pub use model::{Batch, BatchId, File, Issue, IssueId, Title, TitleId};
pub use step::{UnknownStep, WorkflowStep};
