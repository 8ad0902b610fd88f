//! Coordinator wiring: buffer drain loop, walk entry point, shutdown.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use ddms_config::Config;
use ddms_model::ChangeDescriptor;

use crate::error::Result;
use crate::index::coalesce::CoalescingBuffer;
use crate::index::resolver::{IdentityResolver, Outcome};
use crate::index::walker::{ReconciliationWalker, WalkSummary};
use crate::store::broker::StoreHandle;
use crate::thumbs::Thumbnailer;

/// Owns the resolver and drives descriptors from the watch pipeline into
/// store mutations. One engine per watched root.
pub struct IndexEngine {
    config: Arc<Config>,
    store: StoreHandle,
    resolver: Arc<IdentityResolver>,
}

impl IndexEngine {
    pub fn new(config: Arc<Config>, store: StoreHandle) -> Self {
        let thumbs = Thumbnailer::new(&config.index);
        let resolver = Arc::new(IdentityResolver::new(
            config.index.root_directory.clone(),
            store.clone(),
            thumbs,
        ));
        Self {
            config,
            store,
            resolver,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Run one full reconciliation walk to agreement with the live tree.
    pub async fn run_walk(&self) -> Result<WalkSummary> {
        let walker =
            ReconciliationWalker::new(&self.config.index, &self.resolver, &self.store);
        walker.run().await
    }

    /// Spawn the buffer drain loop. Descriptors arrive from the watch
    /// pipeline on `rx`; at most one settled descriptor is executed per
    /// tick. The loop exits when `shutdown` flips or the channel closes;
    /// descriptors still buffered at that point are dropped with their
    /// count logged.
    pub fn spawn_pump(
        &self,
        mut rx: mpsc::Receiver<ChangeDescriptor>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(&self.resolver);
        let delay = Duration::from_millis(self.config.watch.settle_delay_ms);
        let tick_interval = Duration::from_millis(self.config.watch.tick_interval_ms.max(1));

        tokio::spawn(async move {
            let mut buffer = CoalescingBuffer::new(delay);
            let mut tick = interval(tick_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    received = rx.recv() => match received {
                        Some(descriptor) => {
                            buffer.push(descriptor);
                        }
                        None => break,
                    },
                    _ = tick.tick() => {
                        if let Some(descriptor) = buffer.pop_ready(Instant::now()) {
                            execute(&resolver, descriptor).await;
                        }
                    }
                }
            }

            if !buffer.is_empty() {
                // Deliberate shutdown policy: remaining descriptors are
                // dropped, not drained; the next walk reconciles them.
                warn!(
                    dropped = buffer.len(),
                    "shutdown with descriptors still buffered"
                );
            }
            info!("buffer drain loop stopped");
        })
    }
}

/// Execute one settled descriptor. Failures are logged and the descriptor
/// is dropped; there is no retry loop.
async fn execute(resolver: &IdentityResolver, descriptor: ChangeDescriptor) {
    match resolver.apply(&descriptor).await {
        Ok(Outcome::Unchanged | Outcome::NotIndexed) => {
            debug!(path = %descriptor.path, "descriptor resolved to a no-op");
        }
        Ok(outcome) => {
            debug!(path = %descriptor.path, ?outcome, "descriptor applied");
        }
        Err(err) => {
            error!(
                path = %descriptor.path,
                kind = ?descriptor.kind,
                %err,
                "descriptor dropped after failed mutation"
            );
        }
    }
}
