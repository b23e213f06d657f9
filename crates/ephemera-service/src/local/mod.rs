//! Single-process backend
//!
//! In-memory fan-out, history and attachment lookups, plus the local
//! directory file store used by both backends.

mod attachments;
mod fanout;
mod file_store;
mod history;

pub use attachments::LocalAttachmentIndex;
pub use fanout::LocalFanout;
pub use file_store::LocalFileStore;
pub use history::LocalHistory;
