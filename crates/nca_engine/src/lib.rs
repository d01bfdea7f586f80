//! Curation engine: everything that touches disk, network or the clock.
mod batch_maker;
mod batch_xml;
mod chronam;
mod httpcache;
mod lastmod;
mod mover;
mod persist;
mod scanner;
mod serialize;
mod service;
mod sources;
mod store;
mod uploads;
mod watcher;

pub use batch_maker::{full_name, BatchError, BatchMaker, BatchSettings};
pub use batch_xml::{parse_batch_xml, read_batch_xml, BatchXmlIssue};
pub use chronam::{
    edition_from_url, parse_batch, parse_batches_list, parse_title, BatchDetail, BatchMetadata,
    BatchesList, IssueMetadata, TitleDetail, TitleRef,
};
pub use httpcache::{CacheClient, CacheSettings, HttpError, Request};
pub use lastmod::{
    build_manifest, is_quiet, last_modified, page_review_ready, pages_renamed, read_manifest,
    FileInfo, Manifest, ManifestError, MANIFEST_NAME,
};
pub use mover::{move_issue, workflow_subdir, IssueMover, MoveError};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use scanner::{Scanner, ScannerSettings, Snapshot};
pub use serialize::{deserialize, serialize, SnapshotError, CACHE_VERSION};
pub use service::{JobQueue, MemoryJobQueue, MetadataUpdate, WorkflowService, WorkflowSettings};
pub use sources::{
    collect_issue_files, find_disk_batches, find_in_process_issues, find_scanned_issues,
    find_sftp_issues, find_web_batches, FileRules, ScanContext, ScanError,
};
pub use store::{DbBatch, DbTitle, MemoryStore, StoreError, TitleCatalog, WorkflowStore};
pub use uploads::{UploadSettings, UploadedIssues};
pub use watcher::{RefreshGuard, Watcher, WatcherError, WatcherSettings, WatcherStatus};
