//! Indexed file records.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// One indexed file. Unique by `path`.
///
/// `labels`, `bible_refs` and `related_paths` are classification metadata
/// edited through the web surface; the reconciliation engine carries them
/// through mutations untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Root-relative path, forward slashes, primary key.
    pub path: String,
    /// Parent directory component of `path` (empty string at the root).
    pub directory: String,
    /// SHA-512 digest of the file content, secondary identity key.
    pub hash: ContentHash,
    /// Root-relative path of the rendered preview, if generation succeeded.
    pub thumbnail: Option<String>,
    pub labels: Vec<String>,
    pub bible_refs: Vec<String>,
    pub related_paths: Vec<String>,
    /// When the item was first captured into the index.
    pub created_at: DateTime<Utc>,
    /// Membership in the transient "recently added" set.
    pub is_new: bool,
}

impl Item {
    /// Build a freshly captured item. Metadata starts empty and the item is
    /// flagged as new.
    pub fn captured(path: String, hash: ContentHash, thumbnail: Option<String>) -> Self {
        let directory = parent_component(&path);
        Self {
            path,
            directory,
            hash,
            thumbnail,
            labels: Vec::new(),
            bible_refs: Vec::new(),
            related_paths: Vec::new(),
            created_at: Utc::now(),
            is_new: true,
        }
    }
}

/// Derive the `directory` column value from a root-relative path.
pub fn parent_component(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}
