//! Content hashing of files on disk.

use std::path::Path;

use sha2::{Digest, Sha512};

use ddms_model::ContentHash;

use crate::error::{IndexError, Result};

/// Hash a file's full byte content off the async runtime.
///
/// Any IO failure here means the file vanished or became unreadable between
/// discovery and hashing; callers treat that as a transient condition and
/// abort the observation.
pub async fn hash_file(path: &Path) -> Result<ContentHash> {
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || -> Result<ContentHash> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha512::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(ContentHash::from_digest(hasher))
    })
    .await
    .map_err(|join| IndexError::Internal(format!("hashing task panicked: {join}")))?
}
