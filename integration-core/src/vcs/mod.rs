//! Version-control status querying: a porcelain parser, a cached
//! repository facade, and a polling change watcher.

pub mod repository;
pub mod status_parser;
pub mod watcher;

pub use repository::{Repository, StatusSource};
pub use status_parser::{ChangeKind, FileChange, RepositoryStatus};
pub use watcher::StatusWatcher;
