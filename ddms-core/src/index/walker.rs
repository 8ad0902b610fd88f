//! Full-tree reconciliation.
//!
//! Runs at startup (and on demand) to bring the index into agreement with
//! the live tree: every file on disk is identity-resolved, and every
//! persisted path not observed on disk is pruned. A completed walk is
//! authoritative over stale entries.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use ddms_config::IndexConfig;

use crate::error::Result;
use crate::hashing::hash_file;
use crate::index::resolver::{IdentityResolver, Outcome};
use crate::store::broker::StoreHandle;

/// Mutation counts for one completed walk. A repeat walk over an unchanged
/// tree reports zeros everywhere but `unchanged`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub added: u64,
    pub updated: u64,
    pub relocated: u64,
    pub pruned: u64,
    pub unchanged: u64,
    /// Files that vanished mid-walk or could not be read.
    pub skipped: u64,
}

impl WalkSummary {
    /// True when the walk changed nothing.
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.relocated == 0 && self.pruned == 0
    }
}

pub struct ReconciliationWalker<'a> {
    config: &'a IndexConfig,
    resolver: &'a IdentityResolver,
    store: &'a StoreHandle,
}

impl<'a> ReconciliationWalker<'a> {
    pub fn new(
        config: &'a IndexConfig,
        resolver: &'a IdentityResolver,
        store: &'a StoreHandle,
    ) -> Self {
        Self {
            config,
            resolver,
            store,
        }
    }

    pub async fn run(&self) -> Result<WalkSummary> {
        let mut known: HashSet<String> =
            self.store.list_all_paths().await?.into_iter().collect();
        // With nothing persisted there is nothing to match against; every
        // file can be inserted without lookups.
        let bulk_load = known.is_empty();
        info!(
            persisted = known.len(),
            bulk_load, "reconciliation walk started"
        );

        let mut summary = WalkSummary::default();
        let ignored = self.config.ignored_subtrees();
        let root = self.config.root_directory.clone();

        let mut directories = VecDeque::from([root.clone()]);
        while let Some(dir) = directories.pop_front() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "unreadable directory skipped");
                    summary.skipped += 1;
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        // The rest of this directory is unreadable; the
                        // walk itself must go on to the pruning pass.
                        warn!(dir = %dir.display(), %err, "directory iteration interrupted");
                        summary.skipped += 1;
                        break;
                    }
                };
                let path = entry.path();
                let Some(rel) = relative_key(&root, &path) else {
                    continue;
                };
                let file_type = match entry.file_type().await {
                    Ok(ft) => ft,
                    Err(err) => {
                        warn!(path = %path.display(), %err, "unreadable entry skipped");
                        summary.skipped += 1;
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if !is_ignored(&rel, &ignored) {
                        directories.push_back(path);
                    }
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                if is_ignored(&rel, &ignored) || self.config.extension_excluded(&path) {
                    continue;
                }

                self.visit_file(&path, &rel, bulk_load, &mut known, &mut summary)
                    .await?;
            }
        }

        self.prune(known, &mut summary).await?;

        info!(?summary, "reconciliation walk finished");
        Ok(summary)
    }

    async fn visit_file(
        &self,
        absolute: &Path,
        rel: &str,
        bulk_load: bool,
        known: &mut HashSet<String>,
        summary: &mut WalkSummary,
    ) -> Result<()> {
        let hash = match hash_file(absolute).await {
            Ok(hash) => hash,
            Err(crate::IndexError::Io(err)) => {
                warn!(path = rel, %err, "file vanished during walk");
                summary.skipped += 1;
                return Ok(());
            }
            Err(other) => return Err(other),
        };

        if bulk_load {
            self.resolver.insert_unconditionally(rel, hash).await?;
            summary.added += 1;
            return Ok(());
        }

        match self.resolver.resolve_hashed(rel, hash).await? {
            Outcome::Unchanged => summary.unchanged += 1,
            Outcome::Created => summary.added += 1,
            Outcome::ContentUpdated => summary.updated += 1,
            Outcome::Relocated { from } => {
                summary.relocated += 1;
                // The old path is accounted for by the relocation; it must
                // not be pruned as stale afterwards.
                known.remove(&from);
            }
            outcome => {
                warn!(path = rel, ?outcome, "unexpected walk outcome");
                summary.skipped += 1;
            }
        }
        known.remove(rel);
        Ok(())
    }

    /// Whatever survived the walk in the known set was not seen on disk.
    async fn prune(&self, stale: HashSet<String>, summary: &mut WalkSummary) -> Result<()> {
        for path in stale {
            let descriptor = ddms_model::ChangeDescriptor::new(
                ddms_model::ChangeKind::Delete,
                path.clone(),
            );
            match self.resolver.apply(&descriptor).await? {
                Outcome::Deleted => {
                    info!(path = %path, "stale entry pruned");
                    summary.pruned += 1;
                }
                outcome => warn!(path = %path, ?outcome, "stale entry already gone"),
            }
        }
        Ok(())
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let text = rel.to_string_lossy().replace('\\', "/");
    if text.is_empty() { None } else { Some(text) }
}

fn is_ignored(rel: &str, ignored: &[PathBuf]) -> bool {
    ignored.iter().any(|subtree| {
        let prefix = subtree.to_string_lossy().replace('\\', "/");
        rel == prefix || rel.starts_with(&format!("{prefix}/"))
    })
}
