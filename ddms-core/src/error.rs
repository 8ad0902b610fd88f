use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// More than one store record matched a single identity key. Indicates
    /// store corruption; never silently resolved.
    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),

    #[error("database version {found} is newer than this build supports ({supported})")]
    SchemaVersion { found: i64, supported: i64 },

    #[error("store record for {path} holds an invalid content hash: {source}")]
    CorruptHash {
        path: String,
        source: ddms_model::HashParseError,
    },

    #[error("store broker reply not received within {0:?}")]
    BrokerTimeout(Duration),

    #[error("store broker is shut down")]
    BrokerClosed,

    #[error("watch error: {0}")]
    Watch(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
