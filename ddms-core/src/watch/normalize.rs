//! Path normalization of raw watch notifications.
//!
//! Converts absolute, OS-level events into root-relative change
//! descriptors, dropping everything the index must not see: directory
//! events, paths outside the watched root, ignored subtrees (the thumbnail
//! directory above all) and excluded extensions.

use std::path::{Path, PathBuf};

use tracing::trace;

use ddms_config::IndexConfig;
use ddms_model::{ChangeDescriptor, ChangeKind, RawFsEvent, RawFsEventKind};

pub struct Normalizer {
    root: PathBuf,
    ignored: Vec<PathBuf>,
    config: IndexConfig,
}

impl Normalizer {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            root: config.root_directory.clone(),
            ignored: config.ignored_subtrees(),
            config: config.clone(),
        }
    }

    /// Normalize one raw notification, or drop it.
    pub fn normalize(&self, raw: &RawFsEvent) -> Option<ChangeDescriptor> {
        if raw.is_directory {
            trace!(path = %raw.path.display(), "directory event dropped");
            return None;
        }

        let src = self.relative(&raw.path)?;

        let kind = match raw.kind {
            RawFsEventKind::Created => ChangeKind::Add,
            RawFsEventKind::Modified => ChangeKind::Modify,
            RawFsEventKind::Deleted => ChangeKind::Delete,
            RawFsEventKind::Moved => {
                // Both ends must normalize; a move half in, half out of the
                // watched tree records nothing.
                let dst = self.relative(raw.dest_path.as_deref()?)?;
                ChangeKind::Move { dst }
            }
        };

        Some(ChangeDescriptor::new(kind, src))
    }

    /// Root-relative, forward-slash key for an absolute path, or `None`
    /// when the path is invisible to the index.
    fn relative(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        if rel.as_os_str().is_empty() {
            return None;
        }
        let key = rel.to_string_lossy().replace('\\', "/");
        if self.is_ignored(&key) || self.config.extension_excluded(rel) {
            return None;
        }
        Some(key)
    }

    fn is_ignored(&self, key: &str) -> bool {
        self.ignored.iter().any(|subtree| {
            let prefix = subtree.to_string_lossy().replace('\\', "/");
            key == prefix || key.starts_with(&format!("{prefix}/"))
        })
    }
}
