//! Configuration models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_thumbnail_dir_name() -> String {
    ".thumbnails".to_string()
}

fn default_exclude_extensions() -> Vec<String> {
    vec!["sqlite".to_string()]
}

/// Where the watched tree and the index live, and what inside the tree is
/// invisible to the index.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Root of the watched directory tree. All indexed paths are relative
    /// to this directory.
    pub root_directory: PathBuf,
    /// SQLite database file. Defaults to `<root>/data.sqlite`.
    pub database_path: Option<PathBuf>,
    /// Name of the thumbnail directory created directly under the root.
    /// The subtree is always ignored by the watcher and the walker.
    #[serde(default = "default_thumbnail_dir_name")]
    pub thumbnail_dir_name: String,
    /// File extensions (no dot, case-insensitive) never indexed.
    #[serde(default = "default_exclude_extensions")]
    pub exclude_extensions: Vec<String>,
    /// Additional root-relative subtrees invisible to the index.
    pub ignored_directories: Vec<PathBuf>,
    /// Bound on waiting for a store broker reply.
    pub reply_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root_directory: PathBuf::from("."),
            database_path: None,
            thumbnail_dir_name: default_thumbnail_dir_name(),
            exclude_extensions: default_exclude_extensions(),
            ignored_directories: Vec::new(),
            reply_timeout_ms: 30_000,
        }
    }
}

impl IndexConfig {
    /// Absolute thumbnail directory.
    pub fn thumbnail_directory(&self) -> PathBuf {
        self.root_directory.join(&self.thumbnail_dir_name)
    }

    /// Resolved database file path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.root_directory.join("data.sqlite"))
    }

    /// Every root-relative subtree the index must not look into. The
    /// thumbnail directory is always first.
    pub fn ignored_subtrees(&self) -> Vec<PathBuf> {
        let mut subtrees = vec![PathBuf::from(&self.thumbnail_dir_name)];
        subtrees.extend(self.ignored_directories.iter().cloned());
        subtrees
    }

    /// Whether a root-relative path is excluded by extension.
    pub fn extension_excluded(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                self.exclude_extensions.iter().any(|x| x.eq_ignore_ascii_case(&ext))
            }
            None => false,
        }
    }
}

/// Tuning for notification coalescing and buffer draining.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Settle window before a buffered descriptor becomes executable.
    /// Covers editors that write a file several times in quick succession.
    pub settle_delay_ms: u64,
    /// Interval between buffer head polls on the coordinator loop.
    pub tick_interval_ms: u64,
    /// Capacity of the raw notification channel between the watcher thread
    /// and the coordinator.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 15_000,
            tick_interval_ms: 500,
            channel_capacity: 1024,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Top-level DDMS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub watch: WatchConfig,
    pub server: ServerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_original_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.index.thumbnail_dir_name, ".thumbnails");
        assert_eq!(cfg.index.exclude_extensions, vec!["sqlite"]);
        assert_eq!(cfg.watch.settle_delay_ms, 15_000);
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn extension_exclusion_is_case_insensitive() {
        let cfg = IndexConfig::default();
        assert!(cfg.extension_excluded(Path::new("data.SQLITE")));
        assert!(!cfg.extension_excluded(Path::new("notes.txt")));
        assert!(!cfg.extension_excluded(Path::new("no_extension")));
    }

    #[test]
    fn thumbnail_subtree_always_ignored() {
        let cfg = IndexConfig {
            ignored_directories: vec![PathBuf::from("tmp")],
            ..IndexConfig::default()
        };
        let subtrees = cfg.ignored_subtrees();
        assert_eq!(subtrees[0], PathBuf::from(".thumbnails"));
        assert!(subtrees.contains(&PathBuf::from("tmp")));
    }
}
