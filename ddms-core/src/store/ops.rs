//! Typed store operations and their execution against the owned connection.
//!
//! Every operation is parameterized; no SQL is built by string
//! concatenation. Only the broker coordinator calls the execution functions
//! in this module.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;

use ddms_model::{ContentHash, Item, item::parent_component};

use crate::error::{IndexError, Result};

/// Write-path operations, fed by resolver decisions.
#[derive(Debug, Clone)]
pub enum Mutation {
    Insert(Item),
    /// Rewrite an item's path and derived directory; move and rename are
    /// the same operation.
    UpdatePath { from: String, to: String },
    /// Replace content hash and thumbnail reference in place.
    UpdateContent {
        path: String,
        hash: ContentHash,
        thumbnail: Option<String>,
    },
    Delete { path: String },
    /// Clear the transient "recently added" flag.
    MarkSeen { path: String },
}

/// Read-path operations, submitted by the resolver, the walker, and the
/// web query layer.
#[derive(Debug, Clone)]
pub enum Query {
    FindByPath(String),
    FindByHash(ContentHash),
    ListAllPaths,
    ListItems,
    ListRecent,
    Count,
}

/// Result shape for a [`Query`].
#[derive(Debug, Clone)]
pub enum QueryReply {
    Item(Option<Item>),
    Items(Vec<Item>),
    Paths(Vec<String>),
    Count(i64),
}

pub(crate) async fn apply_mutation(conn: &mut SqliteConnection, op: &Mutation) -> Result<u64> {
    let affected = match op {
        Mutation::Insert(item) => {
            sqlx::query(
                "INSERT INTO items
                   (path, dir, shahash, thumb, labels, bibleref, related, created_at, is_new)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&item.path)
            .bind(&item.directory)
            .bind(item.hash.as_str())
            .bind(&item.thumbnail)
            .bind(encode_list(&item.labels)?)
            .bind(encode_list(&item.bible_refs)?)
            .bind(encode_list(&item.related_paths)?)
            .bind(item.created_at)
            .bind(item.is_new)
            .execute(&mut *conn)
            .await?
            .rows_affected()
        }
        Mutation::UpdatePath { from, to } => {
            sqlx::query("UPDATE items SET path = ?1, dir = ?2 WHERE path = ?3")
                .bind(to)
                .bind(parent_component(to))
                .bind(from)
                .execute(&mut *conn)
                .await?
                .rows_affected()
        }
        Mutation::UpdateContent {
            path,
            hash,
            thumbnail,
        } => {
            sqlx::query("UPDATE items SET shahash = ?1, thumb = ?2 WHERE path = ?3")
                .bind(hash.as_str())
                .bind(thumbnail)
                .bind(path)
                .execute(&mut *conn)
                .await?
                .rows_affected()
        }
        Mutation::Delete { path } => sqlx::query("DELETE FROM items WHERE path = ?1")
            .bind(path)
            .execute(&mut *conn)
            .await?
            .rows_affected(),
        Mutation::MarkSeen { path } => sqlx::query("UPDATE items SET is_new = 0 WHERE path = ?1")
            .bind(path)
            .execute(&mut *conn)
            .await?
            .rows_affected(),
    };
    Ok(affected)
}

pub(crate) async fn run_query(conn: &mut SqliteConnection, op: &Query) -> Result<QueryReply> {
    match op {
        Query::FindByPath(path) => {
            let rows = sqlx::query(&select_items("WHERE path = ?1 LIMIT 2"))
                .bind(path)
                .fetch_all(&mut *conn)
                .await?;
            Ok(QueryReply::Item(single_match(rows, "path", path)?))
        }
        Query::FindByHash(hash) => {
            let rows = sqlx::query(&select_items("WHERE shahash = ?1 LIMIT 2"))
                .bind(hash.as_str())
                .fetch_all(&mut *conn)
                .await?;
            Ok(QueryReply::Item(single_match(rows, "hash", hash.as_str())?))
        }
        Query::ListAllPaths => {
            let rows = sqlx::query("SELECT path FROM items")
                .fetch_all(&mut *conn)
                .await?;
            let paths = rows
                .iter()
                .map(|row| sqlx::Row::try_get(row, "path"))
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(QueryReply::Paths(paths))
        }
        Query::ListItems => {
            let rows = sqlx::query(&select_items("ORDER BY path"))
                .fetch_all(&mut *conn)
                .await?;
            Ok(QueryReply::Items(decode_rows(rows)?))
        }
        Query::ListRecent => {
            let rows = sqlx::query(&select_items("WHERE is_new = 1 ORDER BY created_at DESC"))
                .fetch_all(&mut *conn)
                .await?;
            Ok(QueryReply::Items(decode_rows(rows)?))
        }
        Query::Count => {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM items")
                .fetch_one(&mut *conn)
                .await?;
            let n: i64 = sqlx::Row::try_get(&row, "n")?;
            Ok(QueryReply::Count(n))
        }
    }
}

fn select_items(suffix: &str) -> String {
    format!(
        "SELECT path, dir, shahash, thumb, labels, bibleref, related, created_at, is_new
         FROM items {suffix}"
    )
}

/// Identity lookups assume at most one match; a second row means the store
/// is corrupt and the operation is aborted.
fn single_match(rows: Vec<SqliteRow>, key: &str, value: &str) -> Result<Option<Item>> {
    let mut items = decode_rows(rows)?;
    match items.len() {
        0 => Ok(None),
        1 => Ok(items.pop()),
        _ => Err(IndexError::DuplicateIdentity(format!(
            "multiple items share {key} {value}"
        ))),
    }
}

fn decode_rows(rows: Vec<SqliteRow>) -> Result<Vec<Item>> {
    rows.into_iter().map(decode_row).collect()
}

fn decode_row(row: SqliteRow) -> Result<Item> {
    use sqlx::Row;

    let path: String = row.try_get("path")?;
    let raw_hash: String = row.try_get("shahash")?;
    let hash = ContentHash::parse(&raw_hash).map_err(|source| IndexError::CorruptHash {
        path: path.clone(),
        source,
    })?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Item {
        directory: row.try_get("dir")?,
        hash,
        thumbnail: row.try_get("thumb")?,
        labels: decode_list(&row.try_get::<String, _>("labels")?)?,
        bible_refs: decode_list(&row.try_get::<String, _>("bibleref")?)?,
        related_paths: decode_list(&row.try_get::<String, _>("related")?)?,
        created_at,
        is_new: row.try_get("is_new")?,
        path,
    })
}

fn encode_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values)
        .map_err(|err| IndexError::Internal(format!("metadata encoding failed: {err}")))
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|err| IndexError::Internal(format!("metadata decoding failed: {err}")))
}
