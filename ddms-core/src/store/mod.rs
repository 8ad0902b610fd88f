//! Persisted index store.
//!
//! Schema bootstrap and version stamping live here; all runtime access goes
//! through the [`broker`], which is the sole owner of the connection.

pub mod broker;
pub mod ops;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, Row, SqliteConnection};
use tracing::info;

use crate::error::{IndexError, Result};

/// Schema version this build reads and writes.
pub const DATABASE_VERSION: i64 = 1;

const VERSION_KEY: &str = "database_version";

/// Open (or create) the index database file and bring the schema up.
pub async fn open(path: &Path) -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let mut conn = SqliteConnection::connect_with(&options).await?;
    init_schema(&mut conn).await?;
    Ok(conn)
}

/// In-memory database for tests.
pub async fn open_in_memory() -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(sqlx::Error::from)?;
    let mut conn = SqliteConnection::connect_with(&options).await?;
    init_schema(&mut conn).await?;
    Ok(conn)
}

async fn init_schema(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS items (
            path       TEXT PRIMARY KEY,
            dir        TEXT NOT NULL,
            shahash    TEXT NOT NULL,
            thumb      TEXT,
            labels     TEXT NOT NULL DEFAULT '[]',
            bibleref   TEXT NOT NULL DEFAULT '[]',
            related    TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            is_new     INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_dir ON items(dir)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_shahash ON items(shahash)")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS mdata (
            keycol TEXT PRIMARY KEY,
            valcol TEXT
        )",
    )
    .execute(&mut *conn)
    .await?;

    stamp_version(conn).await
}

/// Read the stored schema version, stamping a fresh database. A database
/// written by a newer build is refused rather than guessed at.
async fn stamp_version(conn: &mut SqliteConnection) -> Result<()> {
    let row = sqlx::query("SELECT valcol FROM mdata WHERE keycol = ?1")
        .bind(VERSION_KEY)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        None => {
            sqlx::query("INSERT INTO mdata (keycol, valcol) VALUES (?1, ?2)")
                .bind(VERSION_KEY)
                .bind(DATABASE_VERSION.to_string())
                .execute(&mut *conn)
                .await?;
            info!("initialized index database at schema version {DATABASE_VERSION}");
            Ok(())
        }
        Some(row) => {
            // Stored as text, used as an integer.
            let raw: String = row.try_get("valcol")?;
            let found = raw
                .parse::<i64>()
                .map_err(|_| IndexError::Internal(format!("unparsable schema version {raw:?}")))?;
            if found > DATABASE_VERSION {
                return Err(IndexError::SchemaVersion {
                    found,
                    supported: DATABASE_VERSION,
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_database_is_stamped() {
        let mut conn = open_in_memory().await.unwrap();
        let row = sqlx::query("SELECT valcol FROM mdata WHERE keycol = ?1")
            .bind(VERSION_KEY)
            .fetch_one(&mut conn)
            .await
            .unwrap();
        let version: String = row.try_get("valcol").unwrap();
        assert_eq!(version, DATABASE_VERSION.to_string());
    }

    #[tokio::test]
    async fn newer_database_is_refused() {
        let mut conn = open_in_memory().await.unwrap();
        sqlx::query("UPDATE mdata SET valcol = ?1 WHERE keycol = ?2")
            .bind((DATABASE_VERSION + 1).to_string())
            .bind(VERSION_KEY)
            .execute(&mut conn)
            .await
            .unwrap();

        let err = stamp_version(&mut conn).await.unwrap_err();
        assert!(matches!(err, IndexError::SchemaVersion { .. }));
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        drop(open(&path).await.unwrap());
        drop(open(&path).await.unwrap());
    }
}
