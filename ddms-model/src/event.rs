//! Raw watch-service contract.

use std::path::PathBuf;

/// Event classes emitted by the OS-level watch service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFsEventKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// One best-effort notification from the filesystem watch service, before
/// normalization. May be duplicated or omitted under load; the engine must
/// tolerate both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFsEvent {
    pub kind: RawFsEventKind,
    /// Absolute source path as reported by the OS.
    pub path: PathBuf,
    /// Absolute destination path, present only for `Moved`.
    pub dest_path: Option<PathBuf>,
    pub is_directory: bool,
}
