//! Single-owner arbitration of the store connection.
//!
//! One coordinator task owns the `SqliteConnection` and drains two request
//! channels, a mutation path fed by resolver decisions and a read path fed
//! by anything that queries, strictly one operation at a time. No two
//! mutations and no mutation/read pair ever touch the store concurrently,
//! so reads are linearizable with respect to completed writes.

use std::time::Duration;

use sqlx::{Connection, SqliteConnection};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use ddms_model::{ContentHash, Item};

use crate::error::{IndexError, Result};
use crate::store::ops::{self, Mutation, Query, QueryReply};

const REQUEST_CAPACITY: usize = 256;

struct MutationRequest {
    op: Mutation,
    reply: oneshot::Sender<Result<u64>>,
}

struct ReadRequest {
    op: Query,
    reply: oneshot::Sender<Result<QueryReply>>,
}

/// Cloneable submitter handle. Dropping every clone shuts the coordinator
/// down once in-flight requests have completed.
#[derive(Clone)]
pub struct StoreHandle {
    mutation_tx: mpsc::Sender<MutationRequest>,
    read_tx: mpsc::Sender<ReadRequest>,
    reply_timeout: Duration,
}

/// Spawn the coordinator loop, transferring exclusive ownership of the
/// connection into it.
pub fn spawn(conn: SqliteConnection, reply_timeout: Duration) -> (StoreHandle, JoinHandle<()>) {
    let (mutation_tx, mutation_rx) = mpsc::channel(REQUEST_CAPACITY);
    let (read_tx, read_rx) = mpsc::channel(REQUEST_CAPACITY);

    let task = tokio::spawn(coordinate(conn, mutation_rx, read_rx));

    (
        StoreHandle {
            mutation_tx,
            read_tx,
            reply_timeout,
        },
        task,
    )
}

async fn coordinate(
    mut conn: SqliteConnection,
    mut mutation_rx: mpsc::Receiver<MutationRequest>,
    mut read_rx: mpsc::Receiver<ReadRequest>,
) {
    loop {
        tokio::select! {
            // Mutations first: the write path is bounded by the coalescing
            // buffer's one-per-tick drain, reads can afford to queue behind it.
            biased;
            req = mutation_rx.recv() => match req {
                Some(MutationRequest { op, reply }) => {
                    let result = ops::apply_mutation(&mut conn, &op).await;
                    if reply.send(result).is_err() {
                        debug!("mutation submitter gave up before the reply");
                    }
                }
                None => break,
            },
            req = read_rx.recv() => match req {
                Some(ReadRequest { op, reply }) => {
                    let result = ops::run_query(&mut conn, &op).await;
                    if reply.send(result).is_err() {
                        debug!("read submitter gave up before the reply");
                    }
                }
                None => break,
            },
        }
    }

    if let Err(err) = conn.close().await {
        warn!("closing index store connection failed: {err}");
    }
}

impl StoreHandle {
    /// Submit a mutation and wait (bounded) for the row count it affected.
    pub async fn mutate(&self, op: Mutation) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.mutation_tx
            .send(MutationRequest { op, reply })
            .await
            .map_err(|_| IndexError::BrokerClosed)?;
        self.wait(rx).await
    }

    /// Submit a read operation and wait (bounded) for its reply.
    pub async fn query(&self, op: Query) -> Result<QueryReply> {
        let (reply, rx) = oneshot::channel();
        self.read_tx
            .send(ReadRequest { op, reply })
            .await
            .map_err(|_| IndexError::BrokerClosed)?;
        self.wait(rx).await
    }

    async fn wait<T>(&self, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        match timeout(self.reply_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(IndexError::BrokerClosed),
            Err(_) => Err(IndexError::BrokerTimeout(self.reply_timeout)),
        }
    }

    pub async fn find_by_path(&self, path: &str) -> Result<Option<Item>> {
        match self.query(Query::FindByPath(path.to_string())).await? {
            QueryReply::Item(item) => Ok(item),
            other => Err(unexpected_reply(other)),
        }
    }

    pub async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<Item>> {
        match self.query(Query::FindByHash(hash.clone())).await? {
            QueryReply::Item(item) => Ok(item),
            other => Err(unexpected_reply(other)),
        }
    }

    pub async fn list_all_paths(&self) -> Result<Vec<String>> {
        match self.query(Query::ListAllPaths).await? {
            QueryReply::Paths(paths) => Ok(paths),
            other => Err(unexpected_reply(other)),
        }
    }

    pub async fn list_items(&self) -> Result<Vec<Item>> {
        match self.query(Query::ListItems).await? {
            QueryReply::Items(items) => Ok(items),
            other => Err(unexpected_reply(other)),
        }
    }

    pub async fn list_recent(&self) -> Result<Vec<Item>> {
        match self.query(Query::ListRecent).await? {
            QueryReply::Items(items) => Ok(items),
            other => Err(unexpected_reply(other)),
        }
    }

    pub async fn count(&self) -> Result<i64> {
        match self.query(Query::Count).await? {
            QueryReply::Count(n) => Ok(n),
            other => Err(unexpected_reply(other)),
        }
    }
}

fn unexpected_reply(reply: QueryReply) -> IndexError {
    IndexError::Internal(format!("mismatched broker reply: {reply:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_in_memory;

    async fn broker() -> (StoreHandle, JoinHandle<()>) {
        let conn = open_in_memory().await.unwrap();
        spawn(conn, Duration::from_secs(5))
    }

    fn item(path: &str, content: &[u8]) -> Item {
        Item::captured(path.to_string(), ContentHash::of_bytes(content), None)
    }

    #[tokio::test]
    async fn writes_are_visible_to_subsequent_reads() {
        let (store, task) = broker().await;

        store.mutate(Mutation::Insert(item("a.txt", b"a"))).await.unwrap();
        store.mutate(Mutation::Insert(item("b.txt", b"b"))).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let found = store.find_by_path("a.txt").await.unwrap().unwrap();
        assert_eq!(found.hash, ContentHash::of_bytes(b"a"));

        drop(store);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_submitters_serialize_cleanly() {
        let (store, task) = broker().await;

        let mut joins = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            joins.push(tokio::spawn(async move {
                let path = format!("dir/{i}.txt");
                let body = format!("content {i}");
                store
                    .mutate(Mutation::Insert(Item::captured(
                        path.clone(),
                        ContentHash::of_bytes(body.as_bytes()),
                        None,
                    )))
                    .await
                    .unwrap();
                store.find_by_path(&path).await.unwrap().unwrap()
            }));
        }
        for join in joins {
            join.await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 16);

        drop(store);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stalled_coordinator_bounds_the_wait() {
        // Channels nobody drains stand in for a coordinator stuck on a
        // long-running operation: requests are accepted, replies never come.
        let (mutation_tx, _mutation_rx) = mpsc::channel(4);
        let (read_tx, _read_rx) = mpsc::channel(4);
        let store = StoreHandle {
            mutation_tx,
            read_tx,
            reply_timeout: Duration::from_millis(50),
        };

        let err = store
            .mutate(Mutation::Insert(item("slow.txt", b"slow")))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::BrokerTimeout(_)));

        let err = store.count().await.unwrap_err();
        assert!(matches!(err, IndexError::BrokerTimeout(_)));
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_rejected() {
        let (store, task) = broker().await;
        task.abort();
        let _ = task.await;

        let err = store
            .mutate(Mutation::Insert(item("late.txt", b"late")))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::BrokerClosed));

        let err = store.count().await.unwrap_err();
        assert!(matches!(err, IndexError::BrokerClosed));
    }
}
