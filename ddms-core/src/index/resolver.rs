//! Identity decisions for one hashed observation.
//!
//! Maps an observation of `(path, content hash)` onto exactly one of no-op,
//! create, update-content or update-path, in that tie-break order: the
//! cheap, common case (file re-observed, nothing changed) is checked first,
//! and a content-hash match anywhere else in the index is taken as a
//! move/rename before a new item is minted.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use ddms_model::{ChangeDescriptor, ChangeKind, ContentHash, Item};

use crate::error::{IndexError, Result};
use crate::hashing::hash_file;
use crate::store::broker::StoreHandle;
use crate::store::ops::Mutation;
use crate::thumbs::Thumbnailer;

/// What one observation did to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// File re-observed with unchanged content.
    Unchanged,
    Created,
    ContentUpdated,
    /// Existing item rewritten to a new path; `from` is the old one.
    Relocated { from: String },
    Deleted,
    /// File vanished between discovery and hashing; observation aborted.
    Vanished,
    /// Delete for a path the index never held.
    NotIndexed,
}

pub struct IdentityResolver {
    root: PathBuf,
    store: StoreHandle,
    thumbs: Thumbnailer,
}

impl IdentityResolver {
    pub fn new(root: PathBuf, store: StoreHandle, thumbs: Thumbnailer) -> Self {
        Self { root, store, thumbs }
    }

    /// Consume one drained descriptor and apply its store mutations.
    pub async fn apply(&self, descriptor: &ChangeDescriptor) -> Result<Outcome> {
        match &descriptor.kind {
            ChangeKind::Delete => self.apply_delete(&descriptor.path).await,
            // Add, Modify and Move all reduce to re-observing whatever is
            // on disk at the effective path; the three-way lookup sorts
            // out what actually happened.
            _ => self.observe(descriptor.effective_path()).await,
        }
    }

    /// Hash the file at a root-relative path and resolve its identity.
    pub async fn observe(&self, rel_path: &str) -> Result<Outcome> {
        let absolute = self.root.join(rel_path);
        let hash = match hash_file(&absolute).await {
            Ok(hash) => hash,
            Err(IndexError::Io(err)) => {
                // Transient: the file disappeared or turned unreadable
                // before hashing. Abort this observation without mutating.
                warn!(path = rel_path, %err, "file vanished before hashing");
                return Ok(Outcome::Vanished);
            }
            Err(other) => return Err(other),
        };
        self.resolve_hashed(rel_path, hash).await
    }

    /// Three-way identity resolution for a completed observation.
    pub async fn resolve_hashed(&self, rel_path: &str, hash: ContentHash) -> Result<Outcome> {
        if let Some(existing) = self.store.find_by_path(rel_path).await? {
            if existing.hash == hash {
                return Ok(Outcome::Unchanged);
            }
            return self.update_content(existing, hash).await;
        }

        if let Some(elsewhere) = self.store.find_by_hash(&hash).await? {
            let from = elsewhere.path.clone();
            self.store
                .mutate(Mutation::UpdatePath {
                    from: from.clone(),
                    to: rel_path.to_string(),
                })
                .await?;
            info!(from = %from, to = rel_path, "item relocated");
            return Ok(Outcome::Relocated { from });
        }

        self.create(rel_path, hash).await
    }

    /// Insert without lookups. Only valid while the store is known to hold
    /// no entry for the path (bulk-load fast path of a fresh walk).
    pub async fn insert_unconditionally(&self, rel_path: &str, hash: ContentHash) -> Result<()> {
        self.create(rel_path, hash).await.map(|_| ())
    }

    async fn create(&self, rel_path: &str, hash: ContentHash) -> Result<Outcome> {
        let thumbnail = self.thumbs.generate(&self.absolute(rel_path), &hash).await;
        let item = Item::captured(rel_path.to_string(), hash, thumbnail);
        self.store.mutate(Mutation::Insert(item)).await?;
        info!(path = rel_path, "item created");
        Ok(Outcome::Created)
    }

    async fn update_content(&self, existing: Item, hash: ContentHash) -> Result<Outcome> {
        let thumbnail = self
            .thumbs
            .generate(&self.absolute(&existing.path), &hash)
            .await;
        self.store
            .mutate(Mutation::UpdateContent {
                path: existing.path.clone(),
                hash,
                thumbnail,
            })
            .await?;
        // Artifacts are keyed by content hash, so the superseded one can
        // only be removed once the new reference is committed; a failed
        // mutation must not leave the stored reference dangling.
        self.thumbs.remove_opt(existing.thumbnail.as_deref()).await;
        info!(path = %existing.path, "item content updated");
        Ok(Outcome::ContentUpdated)
    }

    async fn apply_delete(&self, rel_path: &str) -> Result<Outcome> {
        let Some(existing) = self.store.find_by_path(rel_path).await? else {
            debug!(path = rel_path, "delete for unindexed path");
            return Ok(Outcome::NotIndexed);
        };
        self.thumbs.remove_opt(existing.thumbnail.as_deref()).await;
        self.store
            .mutate(Mutation::Delete {
                path: rel_path.to_string(),
            })
            .await?;
        info!(path = rel_path, "item deleted");
        Ok(Outcome::Deleted)
    }

    fn absolute(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
