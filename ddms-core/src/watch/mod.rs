//! Filesystem watch pipeline.
//!
//! A thin wrapper around `notify`: the watcher's callback runs on notify's
//! own thread and forwards raw events over a bounded channel; a pump task
//! converts, normalizes and hands descriptors to the engine's coalescing
//! buffer. The OS source is best-effort: duplicates are absorbed by the
//! buffer, omissions by the next reconciliation walk.

pub mod normalize;

use std::path::PathBuf;

use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ddms_config::Config;
use ddms_model::{ChangeDescriptor, RawFsEvent, RawFsEventKind};

use crate::error::{IndexError, Result};
use crate::watch::normalize::Normalizer;

/// Live watch over the configured root. Dropping the service stops the
/// notify stream; the forwarding task ends when the channel drains.
pub struct WatchService {
    // Held for its Drop side effect.
    _watcher: RecommendedWatcher,
    forward_task: JoinHandle<()>,
}

impl WatchService {
    /// Attach a recursive watcher and start forwarding normalized
    /// descriptors into `out`.
    pub fn start(config: &Config, out: mpsc::Sender<ChangeDescriptor>) -> Result<Self> {
        let root = config.index.root_directory.clone();
        let (raw_tx, raw_rx) = mpsc::channel::<Event>(config.watch.channel_capacity);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    // Send failure means the forwarder is gone; shutdown
                    // is in progress and the event can be dropped.
                    let _ = raw_tx.blocking_send(event);
                }
                Err(err) => warn!("watch backend error: {err}"),
            },
            NotifyConfig::default(),
        )
        .map_err(|err| IndexError::Watch(format!("failed to create watcher: {err}")))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|err| {
                IndexError::Watch(format!("failed to watch {}: {err}", root.display()))
            })?;
        info!(root = %root.display(), "filesystem watch started");

        let normalizer = Normalizer::new(&config.index);
        let forward_task = tokio::spawn(forward(raw_rx, normalizer, out));

        Ok(Self {
            _watcher: watcher,
            forward_task,
        })
    }

    /// Stop watching and wait for the forwarder to drain.
    pub async fn stop(self) {
        drop(self._watcher);
        if let Err(err) = self.forward_task.await {
            warn!("watch forwarder ended abnormally: {err}");
        }
        info!("filesystem watch stopped");
    }
}

async fn forward(
    mut raw_rx: mpsc::Receiver<Event>,
    normalizer: Normalizer,
    out: mpsc::Sender<ChangeDescriptor>,
) {
    while let Some(event) = raw_rx.recv().await {
        for raw in convert(event) {
            if let Some(descriptor) = normalizer.normalize(&raw)
                && out.send(descriptor).await.is_err()
            {
                return;
            }
        }
    }
}

/// Map one notify event onto zero or more raw events in the watch-service
/// contract. Access and other advisory kinds are dropped here; directory
/// classification is best-effort from event kind plus a metadata probe.
fn convert(event: Event) -> Vec<RawFsEvent> {
    let Some(first) = event.paths.first().cloned() else {
        return Vec::new();
    };

    match event.kind {
        EventKind::Create(kind) => {
            let is_directory = matches!(kind, CreateKind::Folder) || probe_is_dir(&first);
            vec![raw(RawFsEventKind::Created, first, None, is_directory)]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (event.paths.first().cloned(), event.paths.get(1).cloned()) {
                (Some(src), Some(dst)) => {
                    let is_directory = probe_is_dir(&dst);
                    vec![raw(RawFsEventKind::Moved, src, Some(dst), is_directory)]
                }
                _ => Vec::new(),
            }
        }
        // Halves of a rename the backend could not pair: treat the source
        // half as a delete and the destination half as a create. The
        // resolver's hash lookup reunites them.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![raw(RawFsEventKind::Deleted, first, None, false)]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let is_directory = probe_is_dir(&first);
            vec![raw(RawFsEventKind::Created, first, None, is_directory)]
        }
        // Some backends report renames without direction. Re-observing the
        // path sorts it out: a vanished source is a later no-op, a live
        // destination resolves by hash.
        EventKind::Modify(ModifyKind::Name(_)) => {
            let is_directory = probe_is_dir(&first);
            vec![raw(RawFsEventKind::Modified, first, None, is_directory)]
        }
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Metadata(_) | ModifyKind::Any) => {
            let is_directory = probe_is_dir(&first);
            vec![raw(RawFsEventKind::Modified, first, None, is_directory)]
        }
        EventKind::Remove(RemoveKind::Folder) => {
            vec![raw(RawFsEventKind::Deleted, first, None, true)]
        }
        EventKind::Remove(_) => {
            // Nothing left to stat; deleting an unindexed path is a no-op
            // anyway, so file is the safe assumption.
            vec![raw(RawFsEventKind::Deleted, first, None, false)]
        }
        // Access and advisory kinds carry no index-relevant change.
        _ => Vec::new(),
    }
}

fn raw(
    kind: RawFsEventKind,
    path: PathBuf,
    dest_path: Option<PathBuf>,
    is_directory: bool,
) -> RawFsEvent {
    RawFsEvent {
        kind,
        path,
        dest_path,
        is_directory,
    }
}

fn probe_is_dir(path: &std::path::Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind};

    fn notify_event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        let mut event = Event::new(kind);
        event.paths = paths;
        event
    }

    #[test]
    fn paired_rename_becomes_one_move() {
        let event = notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![PathBuf::from("/r/a.txt"), PathBuf::from("/r/b.txt")],
        );
        let raws = convert(event);
        assert_eq!(raws.len(), 1);
        assert_eq!(raws[0].kind, RawFsEventKind::Moved);
        assert_eq!(raws[0].path, PathBuf::from("/r/a.txt"));
        assert_eq!(raws[0].dest_path, Some(PathBuf::from("/r/b.txt")));
    }

    #[test]
    fn unpaired_rename_halves_degrade_to_delete_and_create() {
        let from = convert(notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            vec![PathBuf::from("/r/a.txt")],
        ));
        assert_eq!(from[0].kind, RawFsEventKind::Deleted);

        let to = convert(notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            vec![PathBuf::from("/r/b.txt")],
        ));
        assert_eq!(to[0].kind, RawFsEventKind::Created);
    }

    #[test]
    fn access_events_are_dropped() {
        let raws = convert(notify_event(
            EventKind::Access(notify::event::AccessKind::Any),
            vec![PathBuf::from("/r/a.txt")],
        ));
        assert!(raws.is_empty());
    }

    #[test]
    fn data_modification_maps_to_modified() {
        let raws = convert(notify_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec![PathBuf::from("/r/a.txt")],
        ));
        assert_eq!(raws[0].kind, RawFsEventKind::Modified);
    }
}
